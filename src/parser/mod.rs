pub mod suite_file;
pub mod types;

// Re-export commonly used types
pub use suite_file::SuiteLoader;
pub use types::{Expectation, RequestSpec, Scenario, Suite};

/// 从文件路径加载套件
pub fn load_suite<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Suite> {
    SuiteLoader::load_file(path)
}
