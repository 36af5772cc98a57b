use forge_collections::HashMap;
use forge_core::error::{Error, Result};

use crate::loader::{ClassMetadata, MetadataLoader, MethodMetadata, ModuleMetadata};
use crate::signature::is_valid_signature_desc;
use crate::validate_metadata_name;

pub struct Method {
    pub method_id: u32,
    pub name: String,
    pub signature: String,
    pub code: Vec<u8>,
}

pub struct Class {
    pub class_id: u32,
    pub name: String,
    methods_by_id: HashMap<u32, Method>,
}

impl Class {
    pub fn get_method_by_id(&self, method_id: u32) -> Result<&Method> {
        self.methods_by_id.get(&method_id)
    }
}

pub struct Module {
    pub module_id: u32,
    pub name: String,
    classes_by_name: HashMap<String, u32>,
    classes_by_id: HashMap<u32, Class>,
}

impl Module {
    pub fn get_class_by_id(&self, class_id: u32) -> Result<&Class> {
        self.classes_by_id.get(&class_id)
    }

    pub fn get_class_by_name(&self, name: &str) -> Result<&Class> {
        let class_id = *self.classes_by_name.get(&name.to_string())?;
        self.get_class_by_id(class_id)
    }
}

/// Owns every module registered from a metadata loader. Loading proceeds in three
/// passes — modules, then classes, then methods — so each pass can assume its parents
/// already exist. It's best-effort atomic: a failure partway through leaves the
/// registry unusable, but whatever was registered is still fully owned and gets
/// released when the registry is dropped.
pub struct ModuleRegistry {
    modules_by_name: HashMap<String, u32>,
    modules_by_id: HashMap<u32, Module>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry { modules_by_name: HashMap::new(), modules_by_id: HashMap::new() }
    }

    pub fn load(loader: &dyn MetadataLoader) -> Result<Self> {
        let mut registry = ModuleRegistry::new();
        loader.enumerate(Some(&mut |m: &ModuleMetadata| registry.register_module(m)), None, None)?;
        loader.enumerate(None, Some(&mut |c: &ClassMetadata| registry.register_class(c)), None)?;
        loader.enumerate(None, None, Some(&mut |m: &MethodMetadata| registry.register_method(m)))?;
        Ok(registry)
    }

    pub fn get_module_by_id(&self, module_id: u32) -> Result<&Module> {
        self.modules_by_id.get(&module_id)
    }

    pub fn get_module_by_name(&self, name: &str) -> Result<&Module> {
        let module_id = *self.modules_by_name.get(&name.to_string())?;
        self.get_module_by_id(module_id)
    }

    fn register_module(&mut self, metadata: &ModuleMetadata) -> Result<()> {
        if self.modules_by_name.contains_key(&metadata.name)
            || self.modules_by_id.contains_key(&metadata.module_id)
        {
            return Err(Error::InvalidData);
        }
        self.modules_by_name.put(metadata.name.clone(), metadata.module_id);
        self.modules_by_id.put(
            metadata.module_id,
            Module {
                module_id: metadata.module_id,
                name: metadata.name.clone(),
                classes_by_name: HashMap::new(),
                classes_by_id: HashMap::new(),
            },
        );
        Ok(())
    }

    fn register_class(&mut self, metadata: &ClassMetadata) -> Result<()> {
        let module = self.modules_by_id.get_mut(&metadata.module_id).map_err(|_| Error::InvalidData)?;
        if module.classes_by_name.contains_key(&metadata.name)
            || module.classes_by_id.contains_key(&metadata.class_id)
        {
            return Err(Error::InvalidData);
        }
        module.classes_by_name.put(metadata.name.clone(), metadata.class_id);
        module.classes_by_id.put(
            metadata.class_id,
            Class { class_id: metadata.class_id, name: metadata.name.clone(), methods_by_id: HashMap::new() },
        );
        Ok(())
    }

    fn register_method(&mut self, metadata: &MethodMetadata) -> Result<()> {
        if !validate_metadata_name(&metadata.name) || !is_valid_signature_desc(&metadata.signature) {
            return Err(Error::InvalidData);
        }
        let module = self.modules_by_id.get_mut(&metadata.module_id).map_err(|_| Error::InvalidData)?;
        let class = module.classes_by_id.get_mut(&metadata.class_id).map_err(|_| Error::InvalidData)?;
        if class.methods_by_id.contains_key(&metadata.method_id) {
            return Err(Error::InvalidData);
        }
        class.methods_by_id.put(
            metadata.method_id,
            Method {
                method_id: metadata.method_id,
                name: metadata.name.clone(),
                signature: metadata.signature.clone(),
                code: metadata.code.clone(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ImageFileMetadataLoader;
    use rusqlite::Connection;

    fn build_image(sql: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.db");
        let connection = Connection::open(&path).unwrap();
        connection
            .execute_batch(
                "CREATE TABLE module (module_id INTEGER, name TEXT);
                 CREATE TABLE class (class_id INTEGER, module_id INTEGER, name TEXT);
                 CREATE TABLE method (method_id INTEGER, class_id INTEGER, module_id INTEGER,
                                       name TEXT, signature TEXT, code BLOB);",
            )
            .unwrap();
        connection.execute_batch(sql).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_modules_classes_and_methods() {
        let (_dir, path) = build_image(
            "INSERT INTO module VALUES (1, 'core');
             INSERT INTO class VALUES (10, 1, 'StringBuilder');
             INSERT INTO method VALUES (100, 10, 1, 'append', 'V{core.StringBuilder}', X'0102');",
        );
        let loader = ImageFileMetadataLoader::open(&path).unwrap();
        let registry = ModuleRegistry::load(&loader).unwrap();

        let module = registry.get_module_by_name("core").unwrap();
        assert_eq!(module.module_id, 1);
        let class = module.get_class_by_name("StringBuilder").unwrap();
        assert_eq!(class.class_id, 10);
        let method = class.get_method_by_id(100).unwrap();
        assert_eq!(method.name, "append");
        assert_eq!(method.code, vec![1, 2]);

        assert_eq!(registry.get_module_by_id(1).unwrap().name, "core");
    }

    #[test]
    fn duplicate_module_name_is_invalid_data() {
        let (_dir, path) = build_image(
            "INSERT INTO module VALUES (1, 'core');
             INSERT INTO module VALUES (2, 'core');",
        );
        let loader = ImageFileMetadataLoader::open(&path).unwrap();
        assert_eq!(ModuleRegistry::load(&loader).err(), Some(Error::InvalidData));
    }

    #[test]
    fn class_with_unknown_module_is_invalid_data() {
        let (_dir, path) = build_image("INSERT INTO class VALUES (10, 99, 'Orphan');");
        let loader = ImageFileMetadataLoader::open(&path).unwrap();
        assert_eq!(ModuleRegistry::load(&loader).err(), Some(Error::InvalidData));
    }

    #[test]
    fn method_with_invalid_signature_is_invalid_data() {
        let (_dir, path) = build_image(
            "INSERT INTO module VALUES (1, 'core');
             INSERT INTO class VALUES (10, 1, 'StringBuilder');
             INSERT INTO method VALUES (100, 10, 1, 'append', 'X', X'0102');",
        );
        let loader = ImageFileMetadataLoader::open(&path).unwrap();
        assert_eq!(ModuleRegistry::load(&loader).err(), Some(Error::InvalidData));
    }

    #[test]
    fn method_with_unknown_class_is_invalid_data() {
        let (_dir, path) = build_image(
            "INSERT INTO module VALUES (1, 'core');
             INSERT INTO method VALUES (100, 77, 1, 'append', 'V', X'0102');",
        );
        let loader = ImageFileMetadataLoader::open(&path).unwrap();
        assert_eq!(ModuleRegistry::load(&loader).err(), Some(Error::InvalidData));
    }

    #[test]
    fn missing_module_or_class_lookup_is_not_found() {
        let registry = ModuleRegistry::new();
        assert_eq!(registry.get_module_by_name("nope").err(), Some(Error::NotFound));
        assert_eq!(registry.get_module_by_id(1).err(), Some(Error::NotFound));
    }
}
