//! End-to-end Grad-CAM tests: model evaluation, capture, saliency and overlay.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::module::Param;
use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use camlens::prelude::*;

type TestBackend = Autodiff<NdArray>;

/// 1x1 convolution to channels (+x, -x), global average pooling, fixed linear head.
#[derive(Module, Debug)]
struct Toy<B: Backend> {
    conv: Conv2d<B>,
    head: Linear<B>,
}

impl<B: Backend> Toy<B> {
    fn new(device: &B::Device) -> Self {
        let mut conv = Conv2dConfig::new([1, 2], [1, 1])
            .with_bias(false)
            .init(device);
        conv.weight = Param::from_tensor(Tensor::from_floats([[[[1.0]]], [[[-1.0]]]], device));

        let mut head = LinearConfig::new(2, 2).with_bias(false).init(device);
        head.weight = Param::from_tensor(Tensor::from_floats([[2.0, -1.0], [1.0, 0.5]], device));

        Self { conv, head }
    }
}

impl<B: Backend> TappedModule<B> for Toy<B> {
    fn layer_names(&self) -> Vec<String> {
        vec!["features".to_string()]
    }

    fn input_channels(&self) -> Option<usize> {
        Some(1)
    }

    fn forward_tapped(&self, input: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        let features = tap.tap("features", self.conv.forward(input));
        let [batch, channels, _, _] = features.dims();
        let pooled = features.mean_dim(3).mean_dim(2).reshape([batch, channels]);
        self.head.forward(pooled)
    }
}

fn ramp_input() -> Tensor<TestBackend, 4> {
    let device = Default::default();
    let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
    Tensor::<TestBackend, 1>::from_floats(values.as_slice(), &device).reshape([1, 1, 4, 4])
}

fn toy_cam() -> GradCam<TestBackend, Hooked<TestBackend, Toy<TestBackend>>> {
    let device = Default::default();
    let mut cam = GradCam::new(Hooked::new(Toy::new(&device)), "features").unwrap();
    cam.set_input(ramp_input());
    cam
}

#[test]
fn test_toy_model_saliency_follows_the_ramp() {
    let mut cam = toy_cam();
    let detailed = cam.generate_detailed(0).unwrap();

    // d(score0)/d(+x) = 2/16, d(score0)/d(-x) = 1/16 at every pixel.
    assert_eq!(detailed.channel_weights, vec![0.125, 0.0625]);

    // raw = x/8 - x/16 = x/16, normalized by its max 15/16.
    let expected_raw: Vec<f32> = (0..16).map(|i| i as f32 / 16.0).collect();
    assert_eq!(detailed.raw_map, expected_raw);

    let expected_map: Vec<f32> = (0..16).map(|i| i as f32 / 15.0).collect();
    assert_eq!(detailed.saliency.values(), expected_map.as_slice());
    assert_eq!(detailed.saliency.height(), 4);
    assert_eq!(detailed.saliency.width(), 4);
}

#[test]
fn test_toy_model_negative_evidence_is_uniform_zero() {
    let mut cam = toy_cam();
    let map = cam.generate(1).unwrap();
    assert!(map.is_uniform_zero());
    assert_eq!(map.max(), 0.0);
}

#[test]
fn test_repeated_generation_is_identical() {
    let mut cam = toy_cam();
    let first = cam.generate(0).unwrap();
    let _other = cam.generate(1).unwrap();
    let again = cam.generate(0).unwrap();
    assert_eq!(first, again);
}

#[test]
fn test_hooks_do_not_change_predictions() {
    let device = Default::default();
    let mut plain = Hooked::new(Toy::<TestBackend>::new(&device));
    let expected = predict(&mut plain, ramp_input()).unwrap();

    let mut cam = toy_cam();
    let observed = predict(cam.model_mut(), ramp_input()).unwrap();
    assert_eq!(expected, observed);
}

#[test]
fn test_wrong_channel_count_propagates() {
    let device = Default::default();
    let mut cam = GradCam::new(Hooked::new(Toy::<TestBackend>::new(&device)), "features").unwrap();
    cam.set_input(Tensor::ones([1, 3, 4, 4], &device));
    let err = cam.generate(0).unwrap_err();
    assert!(matches!(err, ExplainError::Core(CoreError::ShapeMismatch { .. })));
}

#[test]
fn test_unknown_layer_is_rejected() {
    let device = Default::default();
    let result = GradCam::new(Hooked::new(Toy::<TestBackend>::new(&device)), "head");
    assert!(result.is_err());
}

#[test]
fn test_classifier_pipeline_over_rgb_image() {
    let device = Default::default();
    let config = ConvClassifierConfig::new(1, 32, 4).with_blocks(vec![4, 8, 8]);
    let model = config.init::<TestBackend>(&device);

    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(48, 40, |x, y| {
        Rgb([(x * 5) as u8, (y * 6) as u8, 128])
    }));
    let input = Preprocessor::from_config(&config).unwrap().tensor(&image, &device);

    let mut model = Hooked::new(model);
    let probabilities = predict(&mut model, input.clone()).unwrap();
    assert_eq!(probabilities.len(), 4);

    let mut cam = GradCam::new(model, &config.target_layer()).unwrap();
    cam.set_input(input);
    let map = cam.generate(2).unwrap();
    assert_eq!(map.height(), config.target_resolution());
    assert_eq!(map.width(), config.target_resolution());
    assert!(map.values().iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(map.target_class, Some(2));

    let overlay = composite(&image, &map).unwrap();
    assert_eq!(overlay.dimensions(), (48, 40));
}

#[test]
fn test_grayscale_image_overlay() {
    let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 4, Luma([100])));
    let map = SaliencyMap::filled(2, 2, 0.0).unwrap();

    let overlay = composite(&gray, &map).unwrap();
    assert_eq!(overlay.dimensions(), (6, 4));
    // 0.6 * 100 + 0.4 * jet(0) = (60, 60, 111)
    assert_eq!(overlay.get_pixel(3, 2), &Rgb([60, 60, 111]));
}

#[test]
fn test_checkpoint_round_trip_preserves_explanations() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("toy_classifier");

    let config = ConvClassifierConfig::new(1, 16, 3).with_blocks(vec![4, 4]);
    let model = config.init::<TestBackend>(&device);
    save_classifier(&model, &CheckpointMetadata::new(config.clone()), &stem).unwrap();
    let (loaded, metadata) = load_classifier::<TestBackend>(&stem, &device).unwrap();
    assert_eq!(metadata.config, config);

    let image = DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, y| Luma([(x * y) as u8])));
    let input = Preprocessor::from_config(&config).unwrap().tensor(&image, &device);

    let layer = config.target_layer();
    let mut original = GradCam::new(Hooked::new(model), &layer).unwrap();
    original.set_input(input.clone());
    let mut restored = GradCam::new(Hooked::new(loaded), &layer).unwrap();
    restored.set_input(input);

    let a = original.generate(1).unwrap();
    let b = restored.generate(1).unwrap();
    for (x, y) in a.values().iter().zip(b.values()) {
        assert!((x - y).abs() < 1e-5);
    }
}
