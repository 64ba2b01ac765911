pub mod books;

use std::sync::Arc;

use bookshelf_kernel::ModuleRegistry;

use crate::app::AppServices;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, services: &AppServices) {
    let books = books::BooksModule::new(books::BooksState::new(services));
    registry.register(Arc::new(books));
}
