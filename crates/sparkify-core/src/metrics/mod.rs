//! Metrics and observability infrastructure.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `server`: optional Prometheus exporter

pub mod events;
pub mod server;

pub use server::init;

/// Macro for emitting metric events.
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding metric through the `metrics` facade.
///
/// # Example
///
/// ```ignore
/// use sparkify_core::metrics::events::RowsWritten;
///
/// emit!(RowsWritten { rows: 100, table: "songs".into() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

// Re-export the macro at crate root
pub use emit;
