pub mod apps;
pub mod content;
pub mod locale;
pub mod nav;

pub use apps::{AppCache, AppDefinition, AppView, Resolved};
pub use content::ArtistContent;
pub use locale::Locale;
pub use nav::{Action, ModalState, NavEntry, NavStore, PhoneState, Route, RouteKind, SheetState};
