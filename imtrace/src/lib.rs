// src/lib.rs
pub mod data {
    pub mod frame;
    pub mod point;
}

pub mod trace {
    pub mod ranges;
    pub mod ion_trace;
    pub mod builder;
}

pub mod mobilogram {
    pub mod profile;
    pub mod builder;
}

pub mod tolerance;
pub mod task;
