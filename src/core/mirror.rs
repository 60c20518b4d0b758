//! 本地镜像：按目录树创建本地目录骨架，并展开为下载清单

use super::crawler::{DirectoryTree, TreeNode};
use super::transfer::TransferJob;
use crate::error::{PortalError, Result};
use crate::portal::is_dir_address;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 目标根目录必须尚不存在
pub fn ensure_fresh(destination_root: &Path) -> Result<()> {
    if destination_root.exists() {
        return Err(PortalError::DestinationExists(destination_root.to_path_buf()));
    }
    Ok(())
}

/// 创建目标根目录及树中每个子目录，任何目录已存在都立即失败
///
/// 返回创建的子目录数量（不含根目录）。
pub fn materialize(tree: &DirectoryTree, destination_root: &Path) -> Result<usize> {
    create_fresh_dir(destination_root)?;
    create_subdirs(tree, destination_root)
}

fn create_subdirs(tree: &DirectoryTree, current: &Path) -> Result<usize> {
    let mut created = 0;
    for (name, node) in tree.iter() {
        if let TreeNode::Directory(sub) = node {
            let path = current.join(name);
            create_fresh_dir(&path)?;
            created += 1 + create_subdirs(sub, &path)?;
        }
    }
    Ok(created)
}

fn create_fresh_dir(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => {
            debug!("创建目录: {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(PortalError::DestinationExists(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// 按爬取顺序列出所有叶子地址，去重且不含目录地址
pub fn flatten(tree: &DirectoryTree) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_leaves(tree, Path::new(""), &mut |address, _| {
        if seen.insert(address.to_string()) {
            out.push(address.to_string());
        }
    });
    out
}

/// 与 [`flatten`] 顺序一致的下载任务，本地路径由树的键（显示名）拼出
pub fn download_jobs(tree: &DirectoryTree, destination_root: &Path) -> Vec<TransferJob> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    collect_leaves(tree, destination_root, &mut |address, local| {
        if seen.insert(address.to_string()) {
            jobs.push(TransferJob::download(address, local));
        }
    });
    jobs
}

fn collect_leaves(tree: &DirectoryTree, current: &Path, visit: &mut dyn FnMut(&str, PathBuf)) {
    for (name, node) in tree.iter() {
        match node {
            TreeNode::Directory(sub) => collect_leaves(sub, &current.join(name), visit),
            TreeNode::File(address) if !is_dir_address(address) => visit(address, current.join(name)),
            TreeNode::File(_) => {}
        }
    }
}
