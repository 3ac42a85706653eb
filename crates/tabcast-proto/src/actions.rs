//! Named constants for the command actions understood by the extension.
//!
//! These are shared between the HTTP route layer (which builds command
//! frames) and the extension-side command handler, so that action names
//! stay in sync without duplicating string literals.

/// Open a new tab with a given URL.
pub const ACTION_CREATE_TAB: &str = "createTab";

/// List open tabs, optionally filtered.
pub const ACTION_GET_TABS: &str = "getTabs";

/// Fetch the active tab of the current window.
pub const ACTION_GET_ACTIVE_TAB: &str = "getActiveTab";

/// Navigate an existing tab to a new URL.
pub const ACTION_NAVIGATE_TAB: &str = "navigateTab";

/// Focus a tab and bring its window to the foreground.
pub const ACTION_ACTIVATE_TAB: &str = "activateTab";

/// Reload a tab, optionally bypassing the cache.
pub const ACTION_RELOAD_TAB: &str = "reloadTab";

/// Extract the rendered content of a tab.
pub const ACTION_GET_CONTENT: &str = "getContent";

/// Extract page metadata (title, description, Open Graph tags).
pub const ACTION_GET_METADATA: &str = "getMetadata";

/// Run a DOM interaction (click, input, select, ...) inside a tab.
pub const ACTION_INTERACT: &str = "interact";

/// Close a tab.
pub const ACTION_CLOSE_TAB: &str = "closeTab";
