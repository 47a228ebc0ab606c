pub mod fallback;
pub mod gesture;
pub mod hands;
pub mod mapper;
pub mod orientation;
pub mod presence;
pub mod smooth;

pub use fallback::FallbackAnimator;
pub use gesture::{classify, Gesture};
pub use hands::{HandSlot, HandsTracker};
pub use mapper::CoordinateMapper;
pub use orientation::{estimate_basis, HandBasis, WorldPose};
pub use presence::{HandMode, HandPresence, Transition};
pub use smooth::HandSmoother;
