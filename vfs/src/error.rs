#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    AlreadyExists,
    NotFound,
    NotADirectory,
    DirectoryNotEmpty,
    /// 空路径、过长的路径或分量
    InvalidPath,
    /// 空闲扇区耗尽，或超出单个文件的容量
    NoSpace,
    /// 调用方的工作目录已不在其父目录中
    StaleWorkDir,
}
