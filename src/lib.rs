pub mod animation;
pub mod config;
pub mod events;
pub mod processing {
    pub mod layout;
    pub mod ripple;
}
pub mod tasks {
    pub mod carousel;
    pub mod gesture;
    pub mod loader;
    pub mod sections;
    pub mod viewer;
}
