pub mod check;
pub mod info;
pub mod platforms;
pub mod split;
pub mod template;
