//! Evacuates workloads from a Kubernetes Node which is about to be lost, similar to `kubectl drain`.
//!
//! A drain cordons the Node, selects the Pods that can be safely removed, and then removes them through the
//! Eviction API (which respects PodDisruptionBudgets) or, on clusters which do not serve evictions, through plain
//! deletion. Removal is only reported once Kubernetes confirms that each Pod is gone.
pub mod cluster;
pub mod constants;
pub mod discovery;
pub mod drain;
pub mod error;
pub mod node;
pub mod pod;
pub mod telemetry;

pub use self::drain::{DrainPolicy, DrainReport, DrainRequest, NodeDrainer};
pub use self::error::{DrainError, DrainPhase};
pub use self::pod::evacuate::EvacuationSettings;
