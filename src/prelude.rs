pub use crate::config::{PoolConfig, PoolConfigBuilder};
pub use crate::dispatcher::{Dispatcher, DispatcherBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{Executor, PanicStrategy, Task, TaskFailure, ThreadPool};
pub use crate::invoke::{MethodInfo, MethodTable};
pub use crate::main_loop::{MainLoop, MainLoopHandle};
pub use crate::mode::{ExecutionMode, ModeRegistry, ModeSource, ModeTag, Tagged};
pub use crate::poster::MainContext;
pub use crate::stats::DispatcherStats;
