mod address_space;
mod analysis_failure;
mod file_backed;
mod pe_scenario;
