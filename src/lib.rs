//! Signed-request social wall with live presence statistics.

pub mod config;
pub mod error;
pub mod state;
pub mod db;
pub mod routes;

pub mod crypto {
    pub mod password;
    pub mod signature;
    pub mod token;
}

pub mod models {
    pub mod user;
    pub mod session;
    pub mod post;
    pub mod statistics;
}

pub mod repositories {
    pub mod user;
    pub mod session;
    pub mod memory;
}

pub mod services {
    pub mod auth;
    pub mod media;
    pub mod session;
    pub mod wall;
}

pub mod handlers {
    pub mod auth;
    pub mod users;
    pub mod live;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod request_auth;
}

pub mod presence {
    pub mod connection;
    pub mod handler;
    pub mod protocol;
    pub mod registry;
}

pub mod validation {
    pub mod auth;
    pub mod text;
}
