pub mod in_memory;
pub mod mercado_pago;
#[cfg(feature = "storage-mysql")]
pub mod mysql;
pub mod unavailable;
