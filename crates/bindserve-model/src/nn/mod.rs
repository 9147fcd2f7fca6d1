//! ImageBind building blocks on top of `candle_nn`.
//!
//! Parameter names follow the released PyTorch checkpoint so a `VarBuilder`
//! over `imagebind_huge.pth` resolves every tensor directly.
pub mod attention;
pub mod head;
pub mod stem;
pub mod transformer;

pub use attention::MultiheadAttention;
pub use head::{Head, Postprocessor};
pub use stem::{AudioStem, TextStem, VisionStem};
pub use transformer::{Block, Mlp, Trunk};
