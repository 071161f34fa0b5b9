//! Function registry and argument types.
//!
//! Both the local matcher and the remote tool-call executor dispatch through
//! one [`FunctionRegistry`], passed explicitly as `Arc<FunctionRegistry>`.

pub mod registry;
pub mod types;

pub use registry::FunctionRegistry;
pub use types::{ArgValue, Arguments, FunctionMeta, Handler, ParamType, ParameterMeta};
