/// Path processing utility functions / 路径处理工具函数

use chrono::DateTime;

/// Clean and normalize path / 清理和规范化路径
/// 1. Replace backslashes with forward slashes / 将反斜杠替换为正斜杠
/// 2. Ensure path starts with / / 确保路径以 / 开头
/// 3. Clean . and .. in path / 清理路径中的 . 和 ..
pub fn fix_and_clean_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    };

    clean_path(&path)
}

/// Clean path, handle ., .. and duplicate / / 清理路径，处理 . 和 .. 和重复的 /
fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Check if sub_path is a subpath of path / 判断 sub_path 是否是 path 的子路径
pub fn is_sub_path(path: &str, sub_path: &str) -> bool {
    let path = fix_and_clean_path(path);
    let sub_path = fix_and_clean_path(sub_path);

    if path == sub_path || path == "/" {
        return true;
    }

    sub_path.starts_with(&format!("{}/", path))
}

/// 从挂载路径中提取实际路径
/// mount_path: 挂载点路径，如 "/oss"
/// raw_path: 请求的完整路径，如 "/oss/avatars/u1.png"
/// 返回实际路径: "/avatars/u1.png"
pub fn get_actual_path(mount_path: &str, raw_path: &str) -> String {
    let mount_path = fix_and_clean_path(mount_path);
    let raw_path = fix_and_clean_path(raw_path);

    if mount_path == "/" {
        return raw_path;
    }
    let actual = raw_path.strip_prefix(&mount_path).unwrap_or(&raw_path);
    fix_and_clean_path(actual)
}

/// First segment of a logical path (text up to the first `/`) / 路径第一段
pub fn first_segment(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    match path.find('/') {
        Some(pos) => &path[..pos],
        None => path,
    }
}

/// Parent directory of a logical path, empty for top-level entries / 父目录
pub fn dirname(path: &str) -> String {
    let path = path.trim_matches('/');
    match path.rfind('/') {
        Some(pos) => path[..pos].to_string(),
        None => String::new(),
    }
}

/// Last path component / 文件名
pub fn basename(path: &str) -> &str {
    let path = path.trim_end_matches(|c: char| c == '/' || c == '\\');
    match path.rfind(|c: char| c == '/' || c == '\\') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Strip `http://` / `https://` from an endpoint / 去掉协议头
pub fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint)
        .trim_end_matches('/')
}

/// Parse backend timestamps into epoch seconds / 解析时间戳
///
/// Listings report ISO-8601 (`2024-01-01T00:00:00.000Z`), HEAD responses
/// report RFC 2822 (`Mon, 01 Jan 2024 00:00:00 GMT`).
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .map(|dt| dt.timestamp())
        .ok()
}
