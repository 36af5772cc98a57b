use std::path::Path;

use forge_core::error::{merge, Error, Result};
use rusqlite::{Connection, OpenFlags};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMetadata {
    pub module_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
    pub class_id: u32,
    pub module_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMetadata {
    pub method_id: u32,
    pub class_id: u32,
    pub module_id: u32,
    pub name: String,
    pub signature: String,
    pub code: Vec<u8>,
}

type ModuleCallback<'a> = &'a mut dyn FnMut(&ModuleMetadata) -> Result<()>;
type ClassCallback<'a> = &'a mut dyn FnMut(&ClassMetadata) -> Result<()>;
type MethodCallback<'a> = &'a mut dyn FnMut(&MethodMetadata) -> Result<()>;

/// A source of module/class/method metadata. Each callback is optional; omitting one
/// skips that table's scan entirely. A callback error aborts the whole enumeration and
/// is propagated (merged with whatever error, if any, teardown produces afterward).
pub trait MetadataLoader {
    fn enumerate(
        &self,
        on_module: Option<ModuleCallback<'_>>,
        on_class: Option<ClassCallback<'_>>,
        on_method: Option<MethodCallback<'_>>,
    ) -> Result<()>;
}

fn id_in_range(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidData)
}

/// Loads metadata from a read-only embedded relational image (a SQLite database with
/// `module`, `class` and `method` tables).
pub struct ImageFileMetadataLoader {
    connection: Connection,
}

impl ImageFileMetadataLoader {
    pub fn open(image_path: &Path) -> Result<Self> {
        let connection = Connection::open_with_flags(image_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|_| Error::NotFound)?;
        Ok(ImageFileMetadataLoader { connection })
    }

    fn enumerate_modules(&self, on_module: ModuleCallback<'_>) -> Result<()> {
        let mut stmt = self
            .connection
            .prepare("SELECT module_id, name FROM module")
            .map_err(|_| Error::InvalidData)?;
        let mut rows = stmt.query(()).map_err(|_| Error::InvalidData)?;
        loop {
            let Some(row) = rows.next().map_err(|_| Error::InvalidData)? else {
                return Ok(());
            };
            let module_id: i64 = row.get(0).map_err(|_| Error::InvalidData)?;
            let name: String = row.get(1).map_err(|_| Error::InvalidData)?;
            let metadata = ModuleMetadata { module_id: id_in_range(module_id)?, name };
            on_module(&metadata)?;
        }
    }

    fn enumerate_classes(&self, on_class: ClassCallback<'_>) -> Result<()> {
        let mut stmt = self
            .connection
            .prepare("SELECT class_id, module_id, name FROM class")
            .map_err(|_| Error::InvalidData)?;
        let mut rows = stmt.query(()).map_err(|_| Error::InvalidData)?;
        loop {
            let Some(row) = rows.next().map_err(|_| Error::InvalidData)? else {
                return Ok(());
            };
            let class_id: i64 = row.get(0).map_err(|_| Error::InvalidData)?;
            let module_id: i64 = row.get(1).map_err(|_| Error::InvalidData)?;
            let name: String = row.get(2).map_err(|_| Error::InvalidData)?;
            let metadata = ClassMetadata {
                class_id: id_in_range(class_id)?,
                module_id: id_in_range(module_id)?,
                name,
            };
            on_class(&metadata)?;
        }
    }

    fn enumerate_methods(&self, on_method: MethodCallback<'_>) -> Result<()> {
        let mut stmt = self
            .connection
            .prepare("SELECT method_id, class_id, module_id, name, signature, code, length(code) FROM method")
            .map_err(|_| Error::InvalidData)?;
        let mut rows = stmt.query(()).map_err(|_| Error::InvalidData)?;
        loop {
            let Some(row) = rows.next().map_err(|_| Error::InvalidData)? else {
                return Ok(());
            };
            let method_id: i64 = row.get(0).map_err(|_| Error::InvalidData)?;
            let class_id: i64 = row.get(1).map_err(|_| Error::InvalidData)?;
            let module_id: i64 = row.get(2).map_err(|_| Error::InvalidData)?;
            let name: String = row.get(3).map_err(|_| Error::InvalidData)?;
            let signature: String = row.get(4).map_err(|_| Error::InvalidData)?;
            let code: Vec<u8> = row.get(5).map_err(|_| Error::InvalidData)?;
            let length: i64 = row.get(6).map_err(|_| Error::InvalidData)?;
            if length < 1 || length > i64::from(u16::MAX) {
                return Err(Error::InvalidData);
            }
            let metadata = MethodMetadata {
                method_id: id_in_range(method_id)?,
                class_id: id_in_range(class_id)?,
                module_id: id_in_range(module_id)?,
                name,
                signature,
                code,
            };
            on_method(&metadata)?;
        }
    }
}

impl MetadataLoader for ImageFileMetadataLoader {
    fn enumerate(
        &self,
        on_module: Option<ModuleCallback<'_>>,
        on_class: Option<ClassCallback<'_>>,
        on_method: Option<MethodCallback<'_>>,
    ) -> Result<()> {
        let mut err = Error::Ok;
        if let Some(cb) = on_module {
            err = merge(err, self.enumerate_modules(cb).err().unwrap_or(Error::Ok));
        }
        if let Some(cb) = on_class {
            err = merge(err, self.enumerate_classes(cb).err().unwrap_or(Error::Ok));
        }
        if let Some(cb) = on_method {
            err = merge(err, self.enumerate_methods(cb).err().unwrap_or(Error::Ok));
        }
        if err.is_ok() { Ok(()) } else { Err(err) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_image() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.db");
        let connection = Connection::open(&path).unwrap();
        connection
            .execute_batch(
                "CREATE TABLE module (module_id INTEGER, name TEXT);
                 CREATE TABLE class (class_id INTEGER, module_id INTEGER, name TEXT);
                 CREATE TABLE method (method_id INTEGER, class_id INTEGER, module_id INTEGER,
                                       name TEXT, signature TEXT, code BLOB);
                 INSERT INTO module VALUES (1, 'core');
                 INSERT INTO class VALUES (10, 1, 'StringBuilder');
                 INSERT INTO method VALUES (100, 10, 1, 'append', 'V{core.StringBuilder}', X'01020304');",
            )
            .unwrap();
        (dir, path)
    }

    #[test]
    fn enumerates_modules_classes_and_methods() {
        let (_dir, path) = build_image();
        let loader = ImageFileMetadataLoader::open(&path).unwrap();
        let mut modules = Vec::new();
        let mut classes = Vec::new();
        let mut methods = Vec::new();
        loader
            .enumerate(
                Some(&mut |m: &ModuleMetadata| {
                    modules.push(m.clone());
                    Ok(())
                }),
                Some(&mut |c: &ClassMetadata| {
                    classes.push(c.clone());
                    Ok(())
                }),
                Some(&mut |m: &MethodMetadata| {
                    methods.push(m.clone());
                    Ok(())
                }),
            )
            .unwrap();
        assert_eq!(modules, vec![ModuleMetadata { module_id: 1, name: "core".into() }]);
        assert_eq!(classes.len(), 1);
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].code, vec![1, 2, 3, 4]);
    }

    #[test]
    fn skips_tables_whose_callback_is_none() {
        let (_dir, path) = build_image();
        let loader = ImageFileMetadataLoader::open(&path).unwrap();
        let mut modules = Vec::new();
        loader
            .enumerate(Some(&mut |m: &ModuleMetadata| {
                modules.push(m.clone());
                Ok(())
            }), None, None)
            .unwrap();
        assert_eq!(modules.len(), 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = ImageFileMetadataLoader::open(Path::new("/nonexistent/image.db"));
        assert_eq!(result.err(), Some(Error::NotFound));
    }

    #[test]
    fn callback_error_aborts_enumeration() {
        let (_dir, path) = build_image();
        let loader = ImageFileMetadataLoader::open(&path).unwrap();
        let result = loader.enumerate(
            Some(&mut |_: &ModuleMetadata| Err(Error::InvalidState)),
            None,
            None,
        );
        assert_eq!(result.err(), Some(Error::InvalidState));
    }
}
