pub mod name_util;
