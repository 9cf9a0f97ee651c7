pub mod catalog_product;
pub mod chore;
pub mod location;
pub mod pantry_item;

pub use catalog_product::{Entity as CatalogProduct, Model as CatalogProductModel};
pub use chore::{Entity as Chore, Model as ChoreModel};
pub use location::{Entity as Location, Model as LocationModel};
pub use pantry_item::{Entity as PantryItem, Model as PantryItemModel};
