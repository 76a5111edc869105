use anyhow::Result;
use nnport::ops::math::{
    cos_ps, div_ps, dot, exp_ps, load_partial, log_ps, max_ps, min_ps, pow_ps, reduce_min_ps,
    sin_ps, sincos_ps, splat, Activation,
};

use crate::common::assert_close;

#[test]
fn ops_math_lanewise_functions() -> Result<()> {
    let a = [0.0, 1.0, -1.0, 2.0];
    assert_close(&exp_ps(a), &[1.0, 1.0f32.exp(), (-1.0f32).exp(), 2.0f32.exp()])?;
    assert_close(&sin_ps(a), &a.map(f32::sin))?;
    assert_close(&cos_ps(a), &a.map(f32::cos))?;
    let (s, c) = sincos_ps(a);
    assert_close(&s, &sin_ps(a))?;
    assert_close(&c, &cos_ps(a))?;
    assert_close(&div_ps(a, splat(2.0)), &[0.0, 0.5, -0.5, 1.0])?;
    assert_close(&pow_ps(splat(2.0), [0.0, 1.0, 2.0, 3.0]), &[1.0, 2.0, 4.0, 8.0])?;
    assert_close(&min_ps(a, splat(0.5)), &[0.0, 0.5, -1.0, 0.5])?;
    assert_close(&max_ps(a, splat(0.5)), &[0.5, 1.0, 0.5, 2.0])?;
    Ok(())
}

#[test]
fn ops_math_log_of_non_positive_is_nan() -> Result<()> {
    let out = log_ps([1.0, std::f32::consts::E, 0.0, -3.0]);
    assert_close(&out[..2], &[0.0, 1.0])?;
    assert!(out[2].is_nan());
    assert!(out[3].is_nan());
    Ok(())
}

#[test]
fn ops_math_partial_loads_and_reductions() -> Result<()> {
    let lanes = load_partial(&[4.0, -2.0], f32::INFINITY);
    assert_eq!(lanes, [4.0, -2.0, f32::INFINITY, f32::INFINITY]);
    assert_eq!(reduce_min_ps(lanes), -2.0);
    assert_eq!(load_partial(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.0), [1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

#[test]
fn ops_math_dot_handles_tails() -> Result<()> {
    let a = (1..=7).map(|v| v as f32).collect::<Vec<_>>();
    let b = vec![1.0; 7];
    assert_close(&[dot(&a, &b)], &[28.0])?;
    assert_close(&[dot(&a[..3], &a[..3])], &[14.0])?;
    assert_eq!(dot(&[], &[]), 0.0);
    Ok(())
}

#[test]
fn ops_math_activations() -> Result<()> {
    assert_eq!(Activation::default(), Activation::Linear);
    assert_eq!(Activation::Relu.apply(-3.0), 0.0);
    assert_eq!(Activation::Relu6.apply(9.0), 6.0);
    assert_close(&[Activation::Sigmoid.apply(0.0)], &[0.5])?;
    assert_close(&[Activation::Tanh.apply(1.0)], &[1.0f32.tanh()])?;

    let input = [-2.0, -0.5, 0.0, 0.5, 3.0, 8.0];
    for activation in [
        Activation::Linear,
        Activation::Relu,
        Activation::Relu6,
        Activation::Sigmoid,
        Activation::Tanh,
    ] {
        let mut values = input;
        activation.apply_slice(&mut values);
        let expected = input.map(|v| activation.apply(v));
        assert_close(&values, &expected)?;
        let lanes = activation.apply_ps([input[0], input[1], input[2], input[3]]);
        assert_close(&lanes, &expected[..4])?;
    }
    Ok(())
}
