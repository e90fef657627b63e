pub mod domain {
    pub mod entities {
        pub mod chip;
        pub mod option;
        pub mod page;
        pub mod query;
        pub mod record;
        pub mod value;
    }
}

pub mod usecase {
    pub mod config {
        pub mod screen;
    }
    pub mod engine {
        pub mod model;
        pub mod runtime;
        pub mod update;
    }
    pub mod ports {
        pub mod source;
    }
    pub mod services {
        pub mod cascade;
        pub mod chips;
        pub mod data_loader;
        pub mod debounce;
        pub mod option_resolver;
        pub mod permission_gate;
        pub mod query_sync;
    }
}

pub mod infra {
    pub mod import {
        pub mod csv;
    }
    pub mod location;
    pub mod settings;
    pub mod sqlite {
        pub mod queries;
        pub mod repo;
        pub mod schema;
    }
}

pub mod platform {
    pub mod desktop {
        pub mod blocking;
        pub mod logging;
    }
}

pub mod ui {
    pub mod demo;
    pub mod state {
        pub mod grid_state;
    }
}

pub mod app;

#[cfg(test)]
mod tests;
