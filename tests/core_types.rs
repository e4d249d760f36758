use detpost::{BoxTensor, DetPostError, NmsConfig, ScoreTensor, ThresholdedBatch};

#[test]
fn box_tensor_rejects_short_buffers() {
    let data = vec![0f32; 7];
    let err = BoxTensor::new(&data, 1, 2).err().unwrap();
    assert_eq!(err, DetPostError::BufferTooSmall { needed: 8, got: 7 });
}

#[test]
fn box_tensor_rejects_zero_dimensions() {
    let data = vec![0f32; 8];
    let err = BoxTensor::new(&data, 0, 2).err().unwrap();
    assert_eq!(
        err,
        DetPostError::InvalidDimensions {
            batch: 0,
            anchors: 2,
        }
    );
}

#[test]
fn score_tensor_rejects_short_buffers() {
    let data = vec![0f32; 5];
    let err = ScoreTensor::new(&data, 1, 2, 3).err().unwrap();
    assert_eq!(err, DetPostError::BufferTooSmall { needed: 6, got: 5 });
}

#[test]
fn tensor_rows_are_per_image_slices() {
    let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
    let boxes = BoxTensor::new(&data, 2, 2).unwrap();
    assert_eq!(boxes.batch(), 2);
    assert_eq!(boxes.anchors(), 2);
    assert_eq!(boxes.image(0), &data[..8]);
    assert_eq!(boxes.image(1), &data[8..]);

    let scores = ScoreTensor::new(&data, 2, 4, 2).unwrap();
    assert_eq!(scores.classes(), 2);
    assert_eq!(scores.image(1), &data[8..]);
}

#[test]
fn thresholded_batch_validates_its_buffers() {
    let err = ThresholdedBatch::from_parts(vec![0f32; 4], vec![0f32; 2], 1, 2, 1)
        .err()
        .unwrap();
    assert_eq!(err, DetPostError::BufferTooSmall { needed: 8, got: 4 });
}

#[test]
fn config_rejects_out_of_range_values() {
    let bad_iou = NmsConfig {
        iou_threshold: 1.5,
        ..NmsConfig::default()
    };
    assert_eq!(
        bad_iou.validate().err().unwrap(),
        DetPostError::InvalidConfig {
            name: "iou_threshold",
            value: 1.5,
            constraint: "must lie in [0, 1]",
        }
    );

    let bad_post = NmsConfig {
        post_nms_size: 0,
        ..NmsConfig::default()
    };
    assert!(matches!(
        bad_post.validate(),
        Err(DetPostError::InvalidConfig {
            name: "post_nms_size",
            ..
        })
    ));

    let bad_sigma = NmsConfig {
        soft_nms_sigma: 0.0,
        ..NmsConfig::default()
    };
    assert!(matches!(
        bad_sigma.validate(),
        Err(DetPostError::InvalidConfig {
            name: "soft_nms_sigma",
            ..
        })
    ));

    let bad_classes = NmsConfig {
        num_classes: 0,
        ..NmsConfig::default()
    };
    assert!(bad_classes.validate().is_err());

    assert!(NmsConfig::default().validate().is_ok());
}
