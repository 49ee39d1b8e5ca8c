// tabstore services
// Services work with external collaborators: the content layer, durable storage and the config file.

pub mod capture;
pub mod crash_recovery;
pub mod restore;
pub mod session_files;
pub mod session_writer;
pub mod settings_engine;
