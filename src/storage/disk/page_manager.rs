use crate::storage::error::StorageResult;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Page-granular access to one file. Page `i` occupies bytes
/// `[i * page_size, (i + 1) * page_size)`.
#[derive(Debug)]
pub struct PageManager {
    path: PathBuf,
    file: Mutex<File>,
    page_size: usize,
}

impl PageManager {
    /// Opens `path`, creating an empty file if it does not exist.
    pub fn open(path: &Path, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            page_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current file length in bytes.
    pub fn len(&self) -> StorageResult<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Page count derived from the file length; a trailing partial page counts.
    pub fn num_pages(&self) -> StorageResult<u32> {
        Ok(self.len()?.div_ceil(self.page_size as u64) as u32)
    }

    /// Reads one page, or returns `None` if the page starts at or past the end
    /// of the file. A trailing partial page is zero-filled.
    pub fn read_page(&self, page_no: u32) -> StorageResult<Option<Vec<u8>>> {
        let offset = self.page_offset(page_no);
        let mut file = self.file.lock();
        let file_size = file.metadata()?.len();
        if offset >= file_size {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.page_size];
        let available = (file_size - offset).min(self.page_size as u64) as usize;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..available])?;
        Ok(Some(buf))
    }

    /// Writes one page, extending the file when `page_no` is at or past its end.
    pub fn write_page(&self, page_no: u32, data: &[u8]) -> StorageResult<()> {
        if data.len() != self.page_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "page image is {} bytes, expected {}",
                    data.len(),
                    self.page_size
                ),
            )
            .into());
        }

        let offset = self.page_offset(page_no);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    fn page_offset(&self, page_no: u32) -> u64 {
        page_no as u64 * self.page_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    const PAGE: usize = 512;

    #[test]
    fn test_open_creates_empty_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t.dat");
        let pm = PageManager::open(&path, PAGE)?;
        assert!(path.exists());
        assert_eq!(pm.num_pages()?, 0);
        assert!(pm.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let pm = PageManager::open(&dir.path().join("t.dat"), PAGE)?;

        let mut buf = vec![0u8; PAGE];
        buf[0] = 42;
        buf[PAGE - 1] = 24;
        pm.write_page(0, &buf)?;

        let read = pm.read_page(0)?.expect("page 0 exists");
        assert_eq!(read, buf);
        assert_eq!(pm.num_pages()?, 1);
        Ok(())
    }

    #[test]
    fn test_read_past_end() -> Result<()> {
        let dir = tempdir()?;
        let pm = PageManager::open(&dir.path().join("t.dat"), PAGE)?;
        assert!(pm.read_page(0)?.is_none());

        pm.write_page(0, &vec![1u8; PAGE])?;
        assert!(pm.read_page(1)?.is_none());
        assert!(pm.read_page(10)?.is_none());
        Ok(())
    }

    #[test]
    fn test_page_boundaries() -> Result<()> {
        let dir = tempdir()?;
        let pm = PageManager::open(&dir.path().join("t.dat"), PAGE)?;
        pm.write_page(0, &vec![1u8; PAGE])?;
        pm.write_page(1, &vec![2u8; PAGE])?;
        pm.write_page(0, &vec![3u8; PAGE])?;

        assert!(pm.read_page(0)?.unwrap().iter().all(|&b| b == 3));
        assert!(pm.read_page(1)?.unwrap().iter().all(|&b| b == 2));
        assert_eq!(pm.len()?, 2 * PAGE as u64);
        Ok(())
    }

    #[test]
    fn test_partial_trailing_page() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t.dat");
        std::fs::write(&path, vec![7u8; PAGE + 10])?;

        let pm = PageManager::open(&path, PAGE)?;
        assert_eq!(pm.num_pages()?, 2);
        let tail = pm.read_page(1)?.unwrap();
        assert!(tail[..10].iter().all(|&b| b == 7));
        assert!(tail[10..].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_wrong_image_size() -> Result<()> {
        let dir = tempdir()?;
        let pm = PageManager::open(&dir.path().join("t.dat"), PAGE)?;
        assert!(pm.write_page(0, &[0u8; 10]).is_err());
        Ok(())
    }

    #[test]
    fn test_reopen_keeps_contents() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t.dat");
        {
            let pm = PageManager::open(&path, PAGE)?;
            pm.write_page(0, &vec![9u8; PAGE])?;
        }
        {
            let pm = PageManager::open(&path, PAGE)?;
            assert_eq!(pm.read_page(0)?.unwrap()[0], 9);
        }
        let pm = PageManager::open(&path, PAGE)?;
        assert_eq!(pm.num_pages()?, 1);
        Ok(())
    }
}
