mod support;

mod control_loop;
