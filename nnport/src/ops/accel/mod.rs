//! Kernels that run through a [`DeviceDriver`](crate::backend::DeviceDriver).
pub mod match_matrix_tensor;
