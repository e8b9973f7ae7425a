mod build;
mod cancel;
mod freshness;
mod modules;
mod support;
