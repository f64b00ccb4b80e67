pub mod chrome;
pub mod matcher;
pub mod pool;
pub mod session;

pub use chrome::{launch_headless_browser, ChromeSession, ChromeSessionFactory, LaunchedBrowser};
pub use matcher::Matcher;
pub use pool::{BrowserPool, PooledSession, SessionFactory};
pub use session::{BrowserSession, Control, ControlKind, PageCondition, SelectOption};
