mod account;
mod assets;
mod common;
mod requirements;
mod root;

pub(crate) use root::get_args;
