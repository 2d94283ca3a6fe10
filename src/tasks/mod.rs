pub mod alarm_loop;
