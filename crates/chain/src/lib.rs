pub mod allocator;
pub mod compiler;
pub mod installer;
pub mod key;
pub mod record;
pub mod rewriter;
pub mod store;
pub mod uninstall;

pub use compiler::ChainCompiler;
pub use installer::{FlowInstaller, SdnFlowInstaller};
pub use record::ChainRecord;
pub use store::ChainStore;
