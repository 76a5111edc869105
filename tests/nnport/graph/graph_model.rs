use anyhow::Result;
use nnport::graph::{OperandId, OperationId};
use nnport::{
    infer_model, AutoPad, Lifetime, Model, ModelError, OperandType, OperationKind, Pool2dParams,
    Precision, UNKNOWN_DIM,
};

use crate::common::f32_type;

fn pool_kind() -> OperationKind {
    OperationKind::Pool2d(Pool2dParams {
        kernel: [2, 2],
        strides: [2, 2],
        auto_pad: AutoPad::Valid,
        ..Pool2dParams::default()
    })
}

#[test]
fn graph_model_build_and_finish() -> Result<()> {
    let mut model = Model::new();
    let x = model.add_operand(&f32_type(&[1, 3, 8, 8]))?;
    let y = model.add_operand(&OperandType::unresolved(Precision::Float32))?;
    let op = model.add_operation(pool_kind())?;
    model.append_input(op, x)?;
    model.append_output(op, y)?;
    model.identify_inputs_and_outputs(&[x], &[y])?;
    infer_model(&mut model)?;
    model.finish()?;

    assert!(model.is_finished());
    assert_eq!(model.execution_order(), &[op]);
    assert_eq!(model.input_operands(), &[x]);
    assert_eq!(model.output_operands(), &[y]);
    assert_eq!(model.operand_type(x)?.lifetime, Lifetime::ModelInput);
    assert_eq!(model.operand_type(y)?.lifetime, Lifetime::ModelOutput);
    assert_eq!(model.operand_type(y)?.dimensions.data, vec![1, 3, 4, 4]);
    assert_eq!(model.operation(op)?.inputs, vec![x]);
    Ok(())
}

#[test]
fn graph_model_rejects_mutation_after_finish() -> Result<()> {
    let mut model = Model::new();
    let x = model.add_operand(&f32_type(&[1, 1, 2, 2]))?;
    let y = model.add_operand(&f32_type(&[1, 1, 1, 1]))?;
    let op = model.add_operation_with(pool_kind(), &[x], &[y])?;
    model.identify_inputs_and_outputs(&[x], &[y])?;
    model.finish()?;

    assert_eq!(model.add_operand(&f32_type(&[1])), Err(ModelError::Finished));
    assert_eq!(model.add_operation(pool_kind()), Err(ModelError::Finished));
    assert_eq!(model.append_input(op, x), Err(ModelError::Finished));
    assert_eq!(model.append_output(op, y), Err(ModelError::Finished));
    assert_eq!(
        model.identify_inputs_and_outputs(&[x], &[y]),
        Err(ModelError::Finished)
    );
    assert_eq!(
        model.set_operand_value(x, vec![0; 16]),
        Err(ModelError::Finished)
    );
    assert!(matches!(model.operand_type_mut(y), Err(ModelError::Finished)));
    assert_eq!(model.finish(), Err(ModelError::Finished));
    Ok(())
}

#[test]
fn graph_model_identify_is_once_only() -> Result<()> {
    let mut model = Model::new();
    let x = model.add_operand(&f32_type(&[2]))?;
    model.identify_inputs_and_outputs(&[x], &[])?;
    assert_eq!(
        model.identify_inputs_and_outputs(&[x], &[]),
        Err(ModelError::AlreadyIdentified)
    );
    Ok(())
}

#[test]
fn graph_model_finish_requires_identification() -> Result<()> {
    let mut model = Model::new();
    model.add_operand(&f32_type(&[2]))?;
    assert_eq!(model.finish(), Err(ModelError::MissingIdentification));
    assert!(!model.is_finished());
    Ok(())
}

#[test]
fn graph_model_rejects_dangling_references() -> Result<()> {
    let mut model = Model::new();
    let x = model.add_operand(&f32_type(&[2]))?;
    let op = model.add_operation(OperationKind::PRelu)?;
    assert_eq!(
        model.append_input(op, OperandId(99)),
        Err(ModelError::DanglingOperand(OperandId(99)))
    );
    assert_eq!(
        model.append_output(OperationId(7), x),
        Err(ModelError::DanglingOperation(OperationId(7)))
    );
    assert_eq!(
        model.identify_inputs_and_outputs(&[OperandId(3)], &[]),
        Err(ModelError::DanglingOperand(OperandId(3)))
    );
    Ok(())
}

#[test]
fn graph_model_rejects_multiple_producers() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let t = model.add_operand(&f32_type(&[2]))?;
    model.add_operation_with(OperationKind::PRelu, &[a], &[t])?;
    model.add_operation_with(OperationKind::PRelu, &[a], &[t])?;
    model.identify_inputs_and_outputs(&[a], &[t])?;
    assert_eq!(
        model.finish(),
        Err(ModelError::MultipleProducers {
            operand: t,
            count: 2
        })
    );
    Ok(())
}

#[test]
fn graph_model_rejects_produced_inputs() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let t = model.add_operand(&f32_type(&[2]))?;
    model.add_operation_with(OperationKind::PRelu, &[a], &[t])?;
    model.add_operation_with(OperationKind::PRelu, &[t], &[a])?;
    model.identify_inputs_and_outputs(&[a], &[t])?;
    assert_eq!(model.finish(), Err(ModelError::ProducedInput(a)));

    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let c = model.add_operand(&f32_type(&[2]))?;
    model.set_operand_value(c, vec![0; 8])?;
    model.add_operation_with(OperationKind::PRelu, &[a], &[c])?;
    model.identify_inputs_and_outputs(&[a], &[])?;
    assert_eq!(model.finish(), Err(ModelError::ProducedInput(c)));
    Ok(())
}

#[test]
fn graph_model_rejects_unproduced_operands() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let orphan = model.add_operand(&f32_type(&[2]))?;
    let y = model.add_operand(&f32_type(&[2]))?;
    let op = model.add_operation_with(OperationKind::PRelu, &[a, orphan], &[y])?;
    model.identify_inputs_and_outputs(&[a], &[y])?;
    assert_eq!(
        model.finish(),
        Err(ModelError::Unproduced {
            operand: orphan,
            operation: op
        })
    );

    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let y = model.add_operand(&f32_type(&[2]))?;
    model.identify_inputs_and_outputs(&[a], &[y])?;
    assert_eq!(model.finish(), Err(ModelError::UnproducedOutput(y)));
    Ok(())
}

#[test]
fn graph_model_rejects_cycles() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let t1 = model.add_operand(&f32_type(&[2]))?;
    let t2 = model.add_operand(&f32_type(&[2]))?;
    model.add_operation_with(OperationKind::PRelu, &[a, t2], &[t1])?;
    model.add_operation_with(OperationKind::PRelu, &[t1], &[t2])?;
    model.identify_inputs_and_outputs(&[a], &[t2])?;
    assert!(matches!(model.finish(), Err(ModelError::Cycle(_))));
    Ok(())
}

#[test]
fn graph_model_orders_operations_by_dependency() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let t = model.add_operand(&f32_type(&[2]))?;
    let y = model.add_operand(&f32_type(&[2]))?;
    let consumer = model.add_operation_with(OperationKind::PRelu, &[t], &[y])?;
    let producer = model.add_operation_with(OperationKind::PRelu, &[a], &[t])?;
    model.identify_inputs_and_outputs(&[a], &[y])?;
    model.finish()?;
    assert_eq!(model.execution_order(), &[producer, consumer]);
    Ok(())
}

#[test]
fn graph_model_rejects_unresolved_boundary_dims() -> Result<()> {
    let build = |ty: OperandType| -> Result<Result<(), ModelError>> {
        let mut model = Model::new();
        let a = model.add_operand(&ty)?;
        let y = model.add_operand(&f32_type(&[2, 4]))?;
        model.add_operation_with(OperationKind::PRelu, &[a], &[y])?;
        model.identify_inputs_and_outputs(&[a], &[y])?;
        Ok(model.finish())
    };

    let a = OperandId(0);
    assert_eq!(
        build(f32_type(&[UNKNOWN_DIM, 4]))?,
        Err(ModelError::UnresolvedDimension { operand: a, axis: 0 })
    );
    // A sequence operand binds its leading extent from its offsets.
    assert_eq!(build(f32_type(&[UNKNOWN_DIM, 4]).with_lod_level(1))?, Ok(()));
    assert_eq!(
        build(f32_type(&[UNKNOWN_DIM, 4]).with_dynamic(vec![vec![2, 4], vec![6, 4]])?)?,
        Ok(())
    );
    assert_eq!(
        build(f32_type(&[2, UNKNOWN_DIM]).with_lod_level(1))?,
        Err(ModelError::UnresolvedDimension { operand: a, axis: 1 })
    );
    Ok(())
}

#[test]
fn graph_model_binds_constant_values() -> Result<()> {
    let mut model = Model::new();
    let c = model.add_operand(&f32_type(&[2]))?;
    assert!(matches!(
        model.set_operand_value(c, vec![0; 7]),
        Err(ModelError::InvalidType(_))
    ));
    model.set_operand_value(c, vec![0; 8])?;
    assert!(model.operand(c)?.is_constant());
    assert_eq!(model.operand(c)?.buffer.as_deref(), Some(&[0u8; 8][..]));

    let unknown = model.add_operand(&f32_type(&[UNKNOWN_DIM]))?;
    assert!(matches!(
        model.set_operand_value(unknown, vec![0; 4]),
        Err(ModelError::InvalidType(_))
    ));
    Ok(())
}

#[test]
fn graph_model_rejects_produced_inputs_after_inference() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let b = model.add_operand(&f32_type(&[2]))?;
    let y = model.add_operand(&OperandType::unresolved(Precision::Float32))?;
    model.add_operation_with(OperationKind::PRelu, &[b, b], &[a])?;
    model.add_operation_with(OperationKind::PRelu, &[a, a], &[y])?;
    model.identify_inputs_and_outputs(&[a, b], &[y])?;
    infer_model(&mut model)?;

    assert_eq!(model.operand_type(a)?.lifetime, Lifetime::ModelInput);
    assert_eq!(model.finish(), Err(ModelError::ProducedInput(a)));
    assert!(!model.is_finished());
    Ok(())
}

#[test]
fn graph_model_rejects_produced_constants_after_inference() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let c = model.add_operand(&f32_type(&[2]))?;
    model.set_operand_value(c, vec![0; 8])?;
    model.add_operation_with(OperationKind::PRelu, &[a, a], &[c])?;
    model.identify_inputs_and_outputs(&[a], &[])?;
    infer_model(&mut model)?;

    assert_eq!(model.operand_type(c)?.lifetime, Lifetime::Constant);
    assert_eq!(model.finish(), Err(ModelError::ProducedInput(c)));
    Ok(())
}

#[test]
fn graph_model_rejects_producer_of_bound_buffer() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[2]))?;
    let c = model.add_operand(&f32_type(&[2]))?;
    model.set_operand_value(c, vec![0; 8])?;
    model.operand_type_mut(c)?.lifetime = Lifetime::Temporary;
    model.add_operation_with(OperationKind::PRelu, &[a, a], &[c])?;
    model.identify_inputs_and_outputs(&[a], &[c])?;
    // The boundary retags `c` as an output, but its bound value still counts.
    assert_eq!(model.finish(), Err(ModelError::ProducedInput(c)));
    Ok(())
}

#[test]
fn graph_model_rejects_uninferred_outputs() -> Result<()> {
    let mut model = Model::new();
    let x = model.add_operand(&f32_type(&[1, 3, 8, 8]))?;
    let y = model.add_operand(&OperandType::unresolved(Precision::Float32))?;
    model.add_operation_with(pool_kind(), &[x], &[y])?;
    model.identify_inputs_and_outputs(&[x], &[y])?;
    assert_eq!(model.finish(), Err(ModelError::Uninferred(y)));

    let mut model = Model::new();
    let x = model.add_operand(&f32_type(&[1, 3, 8, 8]))?;
    let t = model.add_operand(&OperandType::unresolved(Precision::Float32))?;
    let y = model.add_operand(&f32_type(&[1, 3, 2, 2]))?;
    model.add_operation_with(pool_kind(), &[x], &[t])?;
    model.add_operation_with(pool_kind(), &[t], &[y])?;
    model.identify_inputs_and_outputs(&[x], &[y])?;
    assert_eq!(model.finish(), Err(ModelError::Uninferred(t)));
    Ok(())
}

#[test]
fn graph_model_infers_in_dependency_order() -> Result<()> {
    let mut model = Model::new();
    let a = model.add_operand(&f32_type(&[1, 2, 8, 8]))?;
    let t = model.add_operand(&OperandType::unresolved(Precision::Float32))?;
    let y = model.add_operand(&OperandType::unresolved(Precision::Float32))?;
    let consumer = model.add_operation_with(pool_kind(), &[t], &[y])?;
    let producer = model.add_operation_with(pool_kind(), &[a], &[t])?;
    model.identify_inputs_and_outputs(&[a], &[y])?;
    infer_model(&mut model)?;
    model.finish()?;

    assert_eq!(model.operand_type(t)?.dimensions.data, vec![1, 2, 4, 4]);
    assert_eq!(model.operand_type(y)?.dimensions.data, vec![1, 2, 2, 2]);
    assert_eq!(model.execution_order(), &[producer, consumer]);
    Ok(())
}

#[test]
fn graph_model_infer_rejects_pending_inputs() -> Result<()> {
    let mut model = Model::new();
    let t = model.add_operand(&OperandType::unresolved(Precision::Float32))?;
    let y = model.add_operand(&OperandType::unresolved(Precision::Float32))?;
    let op = model.add_operation_with(OperationKind::PRelu, &[t, t], &[y])?;
    let err = nnport::infer_operation(&mut model, op).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ModelError>(),
        Some(&ModelError::Uninferred(t))
    );
    assert!(model.operand_type(y)?.is_pending());
    Ok(())
}
