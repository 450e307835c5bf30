//! Internal utility functions.

use std::{fs, io, path};

/// Reads the entire contents of a file into a `String`.
///
/// Rig and weight documents are small, so the whole file is read up front.
pub fn read_file_to_string<P: AsRef<path::Path>>(path: P) -> io::Result<String> {
    use self::io::Read;
    let path = path.as_ref();
    let file = fs::File::open(path)?;
    let len = file.metadata()?.len() as usize;
    let mut contents = String::with_capacity(len);
    let read = io::BufReader::new(file).read_to_string(&mut contents)?;
    trace!("Read {} bytes from {}", read, path.display());
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile;

    #[test]
    fn reads_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"bones\": {{}}}}").unwrap();
        assert_eq!(read_file_to_string(file.path()).unwrap(), "{\"bones\": {}}");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_file_to_string("/definitely/not/here").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
