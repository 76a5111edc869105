use anyhow::Result;
use nnport::graph::{describe_operation, operand_to_string};
use nnport::types::ScaleBuffer;
use nnport::{
    Dimensions, Model, ModelError, OperandType, Operation, OperationKind, Pool2dParams, PoolKind,
    Precision, QuantParams, UNKNOWN_DIM,
};

use crate::common::f32_type;

#[test]
fn graph_types_model_owns_channel_scales() -> Result<()> {
    let quant = QuantParams::per_channel(&[0.5, 0.25, 0.125], 0)?;
    let mut ty = OperandType::new(Precision::QuantInt8SymmPerChannel, vec![3, 4]).with_quant(quant);

    let mut model = Model::new();
    let id = model.add_operand(&ty)?;

    let source_ptr = match &ty.quant {
        QuantParams::PerChannel(params) => params.scales.as_ptr(),
        _ => unreachable!(),
    };
    if let QuantParams::PerChannel(params) = &mut ty.quant {
        params.scales.as_mut_slice()[0] = 9.0;
    }

    let stored = model.operand_type(id)?;
    assert_eq!(stored.quant.channel_scales(), Some(&[0.5, 0.25, 0.125][..]));
    let stored_ptr = match &stored.quant {
        QuantParams::PerChannel(params) => params.scales.as_ptr(),
        _ => unreachable!(),
    };
    assert_ne!(source_ptr, stored_ptr);
    Ok(())
}

#[test]
fn graph_types_scale_buffers_never_share_storage() -> Result<()> {
    let original = ScaleBuffer::copy_from(&[1.0, 2.0])?;
    let copy = original.clone();
    assert_eq!(original, copy);
    assert_ne!(original.as_ptr(), copy.as_ptr());
    assert_eq!(copy.len(), 2);
    assert!(!copy.is_empty());
    Ok(())
}

#[test]
fn graph_types_quant_params_must_match_precision() -> Result<()> {
    let mut model = Model::new();

    let missing = OperandType::new(Precision::QuantInt8SymmPerChannel, vec![2]);
    assert!(matches!(
        model.add_operand(&missing),
        Err(ModelError::InvalidType(_))
    ));

    let unexpected = f32_type(&[2]).with_quant(QuantParams::per_channel(&[1.0, 1.0], 0)?);
    assert!(matches!(
        model.add_operand(&unexpected),
        Err(ModelError::InvalidType(_))
    ));

    let per_layer = OperandType::new(Precision::QuantUInt8AsymmPerLayer, vec![2]);
    assert!(matches!(
        model.add_operand(&per_layer),
        Err(ModelError::InvalidType(_))
    ));
    model.add_operand(&per_layer.with_quant(QuantParams::per_tensor(0.1, 128)))?;

    let wrong_count = OperandType::new(Precision::QuantInt8SymmPerChannel, vec![3, 2])
        .with_quant(QuantParams::per_channel(&[1.0, 1.0], 0)?);
    assert!(matches!(
        model.add_operand(&wrong_count),
        Err(ModelError::InvalidType(_))
    ));

    let bad_axis = OperandType::new(Precision::QuantInt8SymmPerChannel, vec![2])
        .with_quant(QuantParams::per_channel(&[1.0, 1.0], 4)?);
    assert!(matches!(
        model.add_operand(&bad_axis),
        Err(ModelError::InvalidType(_))
    ));
    Ok(())
}

#[test]
fn graph_types_dimension_validation() -> Result<()> {
    assert!(Dimensions::new(vec![2, UNKNOWN_DIM]).validate().is_ok());
    assert!(Dimensions::new(vec![2, -3]).validate().is_err());
    assert!(Dimensions::with_dynamic(vec![UNKNOWN_DIM, 4], vec![vec![2, 4]]).is_ok());
    assert!(Dimensions::with_dynamic(vec![UNKNOWN_DIM, 4], vec![vec![2]]).is_err());
    assert!(Dimensions::with_dynamic(vec![UNKNOWN_DIM, 4], vec![vec![UNKNOWN_DIM, 4]]).is_err());
    let too_many = vec![vec![1, 4]; nnport::settings::MAX_DYNAMIC_SHAPES + 1];
    assert!(Dimensions::with_dynamic(vec![UNKNOWN_DIM, 4], too_many).is_err());

    assert_eq!(Dimensions::new(vec![2, 3, 4]).production(), Some(24));
    assert_eq!(Dimensions::new(vec![2, UNKNOWN_DIM]).production(), None);
    assert_eq!(Dimensions::new(Vec::new()).production(), Some(1));

    // A pending shape has no rank yet, so it is not a scalar.
    assert!(Dimensions::pending().validate().is_ok());
    assert_eq!(Dimensions::pending().production(), None);
    assert_ne!(Dimensions::pending(), Dimensions::new(Vec::new()));
    let mut bogus = Dimensions::pending();
    bogus.data.push(3);
    assert!(bogus.validate().is_err());
    Ok(())
}

#[test]
fn graph_types_precision_metadata() -> Result<()> {
    assert_eq!(Precision::from_ident("f32")?, Precision::Float32);
    assert_eq!(Precision::from_ident("qi16")?, Precision::QuantInt16SymmPerLayer);
    assert!(Precision::from_ident("f8").is_err());
    assert_eq!(Precision::Float32.byte_size(), 4);
    assert_eq!(Precision::Int16.byte_size(), 2);
    assert_eq!(Precision::Float64.byte_size(), 8);
    assert!(Precision::Int16.is_fixed_point_i16());
    assert!(!Precision::Float16.is_fixed_point_i16());
    assert!(Precision::QuantInt32SymmPerChannel.is_per_channel());
    Ok(())
}

#[test]
fn graph_types_render_operands_and_operations() -> Result<()> {
    let ty = f32_type(&[UNKNOWN_DIM, 4])
        .with_dynamic(vec![vec![2, 4], vec![3, 4]])?
        .with_lod_level(1);
    let rendered = operand_to_string(&ty);
    assert_eq!(rendered, "Float32 Nchw [?,4] dyn([2,4] | [3,4]) lod=1 Temporary");
    assert_eq!(
        operand_to_string(&nnport::OperandType::unresolved(Precision::Float32)),
        "Float32 Nchw [pending] Temporary"
    );

    let op = Operation {
        kind: OperationKind::Pool2d(Pool2dParams {
            kind: PoolKind::Avg,
            global_pooling: true,
            ..Pool2dParams::default()
        }),
        inputs: vec![nnport::OperandId(0)],
        outputs: vec![nnport::OperandId(1)],
    };
    assert_eq!(describe_operation(&op), "op pool2d[avg global](#0) >> #1");
    Ok(())
}
