pub mod driver;

pub use driver::{
    GroupWindow, RefreshConfig, RefreshGroup, RefreshHandle, RefreshTrigger, RefreshUpdate,
    Refresher,
};
