use crate::types::{OperandType, QuantParams};

use super::model::Operation;
use super::op_kind::{AutoPad, OperationKind, PoolKind};

pub fn operand_to_string(ty: &OperandType) -> String {
    let dims = if ty.is_pending() {
        "[pending]".to_string()
    } else {
        format_dims(&ty.dimensions.data)
    };
    let mut out = format!("{} {:?} {}", ty.precision, ty.layout, dims);
    if !ty.dimensions.dynamic.is_empty() {
        let alternatives = ty
            .dimensions
            .dynamic
            .iter()
            .map(|shape| format_dims(shape))
            .collect::<Vec<_>>()
            .join(" | ");
        out.push_str(&format!(" dyn({})", alternatives));
    }
    match &ty.quant {
        QuantParams::None => {}
        QuantParams::PerTensor { scale, zero_point } => {
            out.push_str(&format!(" q(scale={}, zp={})", scale, zero_point));
        }
        QuantParams::PerChannel(params) => {
            out.push_str(&format!(
                " q(channels={}, axis={})",
                params.scales.len(),
                params.channel_dim
            ));
        }
    }
    if ty.lod_level > 0 {
        out.push_str(&format!(" lod={}", ty.lod_level));
    }
    out.push_str(&format!(" {:?}", ty.lifetime));
    out
}

pub fn describe_operation(op: &Operation) -> String {
    let inputs = join_ids(op.inputs.iter().map(|id| id.0));
    let outputs = join_ids(op.outputs.iter().map(|id| id.0));
    let attrs = match &op.kind {
        OperationKind::PRelu => String::new(),
        OperationKind::Pool2d(params) => {
            let kind = match params.kind {
                PoolKind::Max => "max",
                PoolKind::Avg => "avg",
            };
            if params.global_pooling {
                format!("[{} global]", kind)
            } else {
                let pad = match params.auto_pad {
                    AutoPad::Explicit => format!("{:?}", params.pads),
                    AutoPad::Same => "same".to_string(),
                    AutoPad::Valid => "valid".to_string(),
                };
                format!(
                    "[{} k={:?} s={:?} pad={}{}]",
                    kind,
                    params.kernel,
                    params.strides,
                    pad,
                    if params.ceil_mode { " ceil" } else { "" }
                )
            }
        }
        OperationKind::Stack { axis } => format!("[axis={}]", axis),
        OperationKind::ReduceMin { axes, keep_dim } => {
            format!("[axes={:?} keep_dim={}]", axes, keep_dim)
        }
        OperationKind::MatchMatrixTensor(params) => format!(
            "[dim_t={}{}]",
            params.dim_t,
            if params.fuse_relu { " relu" } else { "" }
        ),
    };
    format!("op {}{}({}) >> {}", op.kind.tag(), attrs, inputs, outputs)
}

fn format_dims(dims: &[i32]) -> String {
    let rendered = dims
        .iter()
        .map(|dim| if *dim < 0 { "?".to_string() } else { dim.to_string() })
        .collect::<Vec<_>>()
        .join(",");
    format!("[{}]", rendered)
}

fn join_ids(ids: impl Iterator<Item = usize>) -> String {
    ids.map(|id| format!("#{}", id))
        .collect::<Vec<_>>()
        .join(",")
}
