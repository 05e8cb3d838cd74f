use proptest::prelude::*;
use smiv::arch::smiv::{convolution2d, convolve2d};
use smiv::kernels::Activation;
use smiv::network::{fixed_value, Dims, LayerDesc, Tensor};
use smiv::SmivError;

/// Direct (cross-correlation) convolution over the logical values.
fn reference(input: &Tensor, kernels: &Tensor, desc: &LayerDesc) -> Vec<f32> {
  let out = desc.outputs;
  let k = desc.field_size;
  let s = desc.field_stride;
  let mut values = Vec::new();
  for img in 0..input.batch {
    for kern in 0..kernels.batch {
      for r in 0..out.rows {
        for c in 0..out.cols {
          let mut acc = 0.0f32;
          for chan in 0..input.dims.height {
            for kr in 0..k {
              for kc in 0..k {
                acc += input.get(img, chan, r * s + kr, c * s + kc) * kernels.get(kern, chan, kr, kc);
              }
            }
          }
          values.push(acc);
        }
      }
    }
  }
  values
}

fn run(input: &Tensor, kernels: &Tensor, desc: &LayerDesc) -> Vec<f32> {
  let mut result = vec![f32::NAN; input.batch * desc.outputs.len()];
  convolution2d(input.data(), kernels.data(), desc, input.batch, &mut result).unwrap();
  Tensor::from_padded("out", desc.outputs, input.batch, result).unwrap().to_dense()
}

fn layer(rows: usize, cols: usize, chans: usize, k: usize, stride: usize, kernels: usize) -> LayerDesc {
  LayerDesc::convolution("conv", Dims::new(rows, cols, chans), k, stride, 0, kernels, Activation::None).unwrap()
}

fn assert_close(got: &[f32], want: &[f32], tol: f32) {
  assert_eq!(got.len(), want.len());
  for (i, (g, w)) in got.iter().zip(want).enumerate() {
    assert!((g - w).abs() <= tol, "element {}: got {}, want {}", i, g, w);
  }
}

#[test]
fn zero_input_gives_zero_output() {
  // k = 3 runs double throughput, k = 5 single
  for k in [3, 5] {
    for stride in [1, 2, 4] {
      let desc = layer(13, 17, 2, k, stride, 2);
      let input = Tensor::zeros("in", desc.inputs, 1);
      let mut kernels = Tensor::zeros("k", desc.weights, 2);
      kernels.fill_with(|i| fixed_value(i) + 1.0);

      let out = run(&input, &kernels, &desc);
      assert!(out.iter().all(|&v| v == 0.0), "k={} stride={}: {:?}", k, stride, out);
    }
  }
}

#[test]
fn impulse_reproduces_flipped_kernel() {
  let desc = layer(9, 9, 1, 3, 1, 1);
  let mut input = Tensor::zeros("in", desc.inputs, 1);
  input.set(0, 0, 4, 4, 1.0);
  let mut kernels = Tensor::zeros("k", desc.weights, 1);
  kernels.fill_with(|i| i as f32 + 1.0);

  let out = run(&input, &kernels, &desc);
  let cols = desc.outputs.cols;
  for r in 0..desc.outputs.rows {
    for c in 0..cols {
      let want = if (2..=4).contains(&r) && (2..=4).contains(&c) {
        kernels.get(0, 0, 4 - r, 4 - c)
      } else {
        0.0
      };
      assert_eq!(out[r * cols + c], want, "({}, {})", r, c);
    }
  }
}

#[test]
fn impulse_with_wide_kernel_single_throughput() {
  let desc = layer(12, 12, 1, 5, 1, 1);
  let mut input = Tensor::zeros("in", desc.inputs, 1);
  input.set(0, 0, 6, 6, 1.0);
  let mut kernels = Tensor::zeros("k", desc.weights, 1);
  kernels.fill_with(|i| i as f32 + 1.0);

  let out = run(&input, &kernels, &desc);
  let cols = desc.outputs.cols;
  // output (6 - kr, 6 - kc) sees kernel tap (kr, kc)
  for kr in 0..5 {
    for kc in 0..5 {
      assert_eq!(out[(6 - kr) * cols + (6 - kc)], kernels.get(0, 0, kr, kc));
    }
  }
  assert_eq!(out.iter().filter(|&&v| v != 0.0).count(), 25);
}

#[test]
fn strided_impulse_lands_on_every_output_it_reaches() {
  // k = 3 runs double throughput, k = 5 single
  for k in [3, 5] {
    for stride in [2, 4] {
      let desc = layer(17, 19, 1, k, stride, 1);
      let (pr, pc) = (8, 9);
      let mut input = Tensor::zeros("in", desc.inputs, 1);
      input.set(0, 0, pr, pc, 1.0);
      let mut kernels = Tensor::zeros("k", desc.weights, 1);
      kernels.fill_with(|i| i as f32 + 1.0);

      let out = run(&input, &kernels, &desc);
      let cols = desc.outputs.cols;
      let tap = |o: usize, p: usize| (o * stride <= p && p < o * stride + k).then(|| p - o * stride);
      for r in 0..desc.outputs.rows {
        for c in 0..cols {
          let want = match (tap(r, pr), tap(c, pc)) {
            (Some(kr), Some(kc)) => kernels.get(0, 0, kr, kc),
            _ => 0.0,
          };
          assert_eq!(out[r * cols + c], want, "k={} stride={} ({}, {})", k, stride, r, c);
        }
      }
    }
  }
}

#[test]
fn six_by_six_matches_reference() {
  let desc = layer(6, 6, 1, 3, 1, 1);
  assert_eq!((desc.outputs.rows, desc.outputs.cols), (4, 4));
  let mut input = Tensor::zeros("in", desc.inputs, 1);
  input.fill_with(|i| (i as f32 * 0.37).sin());
  let mut kernels = Tensor::zeros("k", desc.weights, 1);
  kernels.fill_with(|i| (i as f32 * 1.3).cos());

  assert_close(&run(&input, &kernels, &desc), &reference(&input, &kernels, &desc), 1e-5);
}

#[test]
fn widths_around_vector_boundaries_match_reference() {
  for cols in [6, 8, 9, 10, 13, 16, 17, 20, 24, 25] {
    for stride in [1, 2, 4] {
      for k in [1, 2, 3, 4, 5, 7] {
        if k > cols {
          continue;
        }
        let desc = layer(9, cols, 2, k, stride, 2);
        let mut input = Tensor::zeros("in", desc.inputs, 2);
        input.fill_with(fixed_value);
        let mut kernels = Tensor::zeros("k", desc.weights, 2);
        kernels.fill_with(|i| fixed_value(i + 5));

        let got = run(&input, &kernels, &desc);
        let want = reference(&input, &kernels, &desc);
        for (i, (g, w)) in got.iter().zip(&want).enumerate() {
          assert!(
            (g - w).abs() <= 1e-4,
            "cols={} stride={} k={} element {}: got {}, want {}",
            cols,
            stride,
            k,
            i,
            g,
            w
          );
        }
      }
    }
  }
}

#[test]
fn padded_layer_reads_padded_input_shape() {
  let desc = LayerDesc::convolution("conv", Dims::new(6, 6, 1), 3, 1, 1, 1, Activation::None).unwrap();
  let padded = desc.conv_input();
  let mut input = Tensor::zeros("in", padded, 1);
  input.fill_with(|i| i as f32 * 0.01);
  let mut kernels = Tensor::zeros("k", desc.weights, 1);
  kernels.fill_with(|_| 1.0);

  // reference against an unpadded layer over the same padded tensor
  let plain = layer(padded.rows, padded.cols, 1, 3, 1, 1);
  assert_close(&run(&input, &kernels, &desc), &reference(&input, &kernels, &plain), 1e-4);
}

#[test]
fn stride_three_is_unsupported() {
  let err = LayerDesc::convolution("conv", Dims::new(9, 9, 1), 3, 3, 0, 1, Activation::None).unwrap_err();
  assert!(matches!(err, SmivError::UnsupportedStride { stride: 3 }));

  let mut desc = layer(9, 9, 1, 3, 1, 1);
  desc.field_stride = 3;
  let input = Tensor::zeros("in", desc.inputs, 1);
  let kernels = Tensor::zeros("k", desc.weights, 1);
  let mut result = vec![0.0; desc.outputs.len()];

  let err = convolve2d(input.data(), kernels.data(), 0, 0, 0, &desc, &mut result).unwrap_err();
  assert!(matches!(err, SmivError::UnsupportedStride { stride: 3 }));
  let err = convolution2d(input.data(), kernels.data(), &desc, 1, &mut result).unwrap_err();
  assert!(matches!(err, SmivError::UnsupportedStride { stride: 3 }));
}

#[test]
fn kernel_wider_than_a_vector_is_rejected() {
  let desc = layer(10, 10, 1, 9, 1, 1);
  let input = Tensor::zeros("in", desc.inputs, 1);
  let kernels = Tensor::zeros("k", desc.weights, 1);
  let mut result = vec![0.0; desc.outputs.len()];

  let err = convolution2d(input.data(), kernels.data(), &desc, 1, &mut result).unwrap_err();
  assert!(matches!(err, SmivError::KernelTooWide { k_width: 9, .. }));
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn matches_reference_on_random_data(
    rows in 7usize..11,
    cols in 8usize..27,
    k in 1usize..8,
    stride in prop::sample::select(vec![1usize, 2, 4]),
    seed in 0u32..1000,
  ) {
    let desc = layer(rows, cols, 2, k, stride, 1);
    let mut input = Tensor::zeros("in", desc.inputs, 1);
    input.fill_with(|i| ((i as u32 * 7919 + seed) % 211) as f32 / 105.5 - 1.0);
    let mut kernels = Tensor::zeros("k", desc.weights, 1);
    kernels.fill_with(|i| ((i as u32 * 104729 + seed) % 97) as f32 / 48.5 - 1.0);

    let got = run(&input, &kernels, &desc);
    let want = reference(&input, &kernels, &desc);
    for (g, w) in got.iter().zip(&want) {
      prop_assert!((g - w).abs() <= 1e-4, "got {}, want {}", g, w);
    }
  }
}
