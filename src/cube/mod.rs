//! Cube Assembly Engine
//!
//! Reconstructs scattered flat records into dense, labeled arrays and writes
//! such arrays back out as records.
//!
//! ## Data Flow
//! ```text
//!   Archive records
//!        │  filters (exact / values / half-open range)
//!        ▼
//!   group() ─────► VariableGroup ×N ──┐
//!        │             (axes, miloc)  │ all share
//!        ▼                            ▼
//!   GeometryInfo                    Cube
//!   (grid | station union)
//!        │
//!        ▼
//!   read_block(group, selectors) ──► ArrayD<f32>  (NaN where missing)
//!   write_block(writer, block, provider, policy) ──► records appended
//! ```

mod axis;
mod block;
mod filter;
mod group;
mod write;

pub use axis::{AxisKind, AxisName, AxisValue, Cube, Threshold};
pub use block::{read_block, AxisSelector};
pub use filter::{Filter, Filters};
pub use group::{group, variable_name, GeometryInfo, Grouping, Member, VariableGroup};
pub use write::{write_block, QuantizationPolicy, WriteBlock};
