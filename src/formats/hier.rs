//! Hierarchical-binary adapter: HDF5 containers (feature `hdf5`).
//!
//! Read-only navigation over nested named groups and datasets. Handles
//! close when the wrappers drop, so no load can leak one past its scope.

use std::path::Path;

use ndarray::ArrayD;

use crate::error::Result;

/// A read-only hierarchical container.
pub struct HierFile {
    file: hdf5::File,
}

impl HierFile {
    /// Open a container read-only. The underlying handle is released when
    /// the returned value drops.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = hdf5::File::open(path.as_ref())?;
        Ok(HierFile { file })
    }

    /// Names of the top-level groups and datasets.
    pub fn top_level_keys(&self) -> Result<Vec<String>> {
        Ok(self.file.member_names()?)
    }

    /// Open a named group. `name` may be a slash-separated path.
    pub fn group(&self, name: &str) -> Result<HierGroup> {
        Ok(HierGroup {
            group: self.file.group(name)?,
        })
    }

    /// Read a dataset under the root. `key` may be a slash-separated path,
    /// so `read_array("strain/Strain")` reaches into a group directly.
    pub fn read_array(&self, key: &str) -> Result<ArrayD<f64>> {
        Ok(self.file.dataset(key)?.read_dyn::<f64>()?)
    }
}

/// A group inside a [`HierFile`].
pub struct HierGroup {
    group: hdf5::Group,
}

impl HierGroup {
    /// Names of this group's members.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.group.member_names()?)
    }

    /// Open a nested group.
    pub fn group(&self, name: &str) -> Result<HierGroup> {
        Ok(HierGroup {
            group: self.group.group(name)?,
        })
    }

    /// Read a dataset in this group as an N-dimensional `f64` array.
    pub fn read_array(&self, key: &str) -> Result<ArrayD<f64>> {
        Ok(self.group.dataset(key)?.read_dyn::<f64>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("sample.h5");
        let file = hdf5::File::create(&path).unwrap();
        let grp = file.create_group("strain").unwrap();
        grp.new_dataset_builder()
            .with_data(&array![0.25, 0.5, 0.75])
            .create("Strain")
            .unwrap();
        file.new_dataset_builder()
            .with_data(&array![[1.0, 2.0], [3.0, 4.0]])
            .create("grid")
            .unwrap();
        path
    }

    #[test]
    fn lists_and_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);

        let h5 = HierFile::open(&path).unwrap();
        let keys = h5.top_level_keys().unwrap();
        assert!(keys.contains(&"strain".to_string()));
        assert!(keys.contains(&"grid".to_string()));

        let grp = h5.group("strain").unwrap();
        assert_eq!(grp.keys().unwrap(), vec!["Strain".to_string()]);

        let arr = grp.read_array("Strain").unwrap();
        assert_eq!(arr.shape(), &[3]);
        assert_eq!(arr[[1]], 0.5);
    }

    #[test]
    fn path_access_reaches_into_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);

        let h5 = HierFile::open(&path).unwrap();
        let arr = h5.read_array("strain/Strain").unwrap();
        assert_eq!(arr.shape(), &[3]);

        let grid = h5.read_array("grid").unwrap();
        assert_eq!(grid.shape(), &[2, 2]);
        assert_eq!(grid[[1, 0]], 3.0);
    }

    #[test]
    fn missing_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);

        let h5 = HierFile::open(&path).unwrap();
        assert!(h5.read_array("nope").is_err());
        assert!(h5.group("nope").is_err());
    }
}
