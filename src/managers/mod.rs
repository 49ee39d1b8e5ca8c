// tabstore state managers
// Managers hold in-memory state: live tabs and windows, closed-tab rings, and the save schedule.

pub mod closed_tabs;
pub mod save_scheduler;
pub mod tab_manager;
