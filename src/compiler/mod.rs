//! Driving the frontend server: result framing, batch compiles, and the
//! resident session.

pub mod batch;
pub mod framer;
pub mod queue;
pub mod session;
pub mod target;

pub use batch::{BatchCompiler, BatchOptions};
pub use framer::{CompilerOutput, ResultFramer};
pub use queue::{RequestHandler, RequestQueue};
pub use session::{CompilerSession, ExpressionRequest, RecompileRequest, SessionConfig};
pub use target::TargetModel;
