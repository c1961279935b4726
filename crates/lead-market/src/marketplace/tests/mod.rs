mod common;
mod leads;
mod profiles;
