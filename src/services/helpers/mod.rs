pub mod consul_helper;
pub mod docker_helper;
pub mod net_helper;
