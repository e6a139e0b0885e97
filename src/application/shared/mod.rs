pub mod device_driver;
