//! Launch collection.
//!
//! Seeded into an empty inventory on first start. Every piece launches with ten
//! units and is flagged as low once five or fewer remain.

use crate::models::Category;

pub const INITIAL_STOCK: i64 = 10;
pub const LOW_STOCK_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedProduct {
    pub code: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub material: &'static str,
    pub price: f64,
    pub image: &'static str,
    pub size: &'static str,
    pub initial_stock: i64,
    pub low_stock_threshold: i64,
}

impl SeedProduct {
    const fn new(
        code: &'static str,
        name: &'static str,
        category: Category,
        material: &'static str,
        price: f64,
        image: &'static str,
        size: &'static str,
    ) -> Self {
        Self {
            code,
            name,
            category,
            material,
            price,
            image,
            size,
            initial_stock: INITIAL_STOCK,
            low_stock_threshold: LOW_STOCK_THRESHOLD,
        }
    }
}

#[rustfmt::skip]
pub const SEED_PRODUCTS: [SeedProduct; 24] = [
    SeedProduct::new("RG001", "Opulent Eternity", Category::Ring, "Gold", 8500.00, "Ring/RG001.png", "7"),
    SeedProduct::new("RG002", "Butterfly Bliss", Category::Ring, "Gold", 8200.00, "Ring/RG002.png", "7"),
    SeedProduct::new("RG003", "Celestial Embrace", Category::Ring, "Gold", 8300.00, "Ring/RG003.png", "7"),
    SeedProduct::new("RRG001", "Butterfly Blossoms", Category::Ring, "Rose Gold", 8400.00, "Ring/RRG001.png", "7"),
    SeedProduct::new("RRG002", "Enchanted Vines", Category::Ring, "Rose Gold", 8200.00, "Ring/RRG002.png", "7"),
    SeedProduct::new("RRG003", "Infinity Elegance", Category::Ring, "Rose Gold", 8600.00, "Ring/RRG003.png", "7"),
    SeedProduct::new("BG001", "Auric Veil", Category::Bracelet, "Gold", 7800.00, "Bracelet/BG001.png", r#"7""#),
    SeedProduct::new("BG002", "Aurum Embrace", Category::Bracelet, "Gold", 7900.00, "Bracelet/BG002.png", r#"7""#),
    SeedProduct::new("BG003", "Golden Harmony", Category::Bracelet, "Gold", 8000.00, "Bracelet/BG003.png", r#"7""#),
    SeedProduct::new("BRG001", "Blush Radiance", Category::Bracelet, "Rose Gold", 7700.00, "Bracelet/BRG001.png", r#"7""#),
    SeedProduct::new("BRG002", "Rosé Serpent", Category::Bracelet, "Rose Gold", 7750.00, "Bracelet/BRG002.png", r#"7""#),
    SeedProduct::new("BRG003", "Vinea Rosa", Category::Bracelet, "Rose Gold", 7850.00, "Bracelet/BRG003.png", r#"7""#),
    SeedProduct::new("NG001", "Coquette Ribbon", Category::Necklace, "Gold", 7800.00, "Necklace/NG001.png", r#"18""#),
    SeedProduct::new("NG002", "Golden Butterfly", Category::Necklace, "Gold", 8000.00, "Necklace/NG002.png", r#"18""#),
    SeedProduct::new("NG003", "Vintage Heart", Category::Necklace, "Gold", 8100.00, "Necklace/NG003.png", r#"18""#),
    SeedProduct::new("NRG001", "Aurora Heart", Category::Necklace, "Rose Gold", 7900.00, "Necklace/NRG001.png", r#"18""#),
    SeedProduct::new("NRG002", "Drop Pendant Necklace", Category::Necklace, "Rose Gold", 7950.00, "Necklace/NRG002.png", r#"18""#),
    SeedProduct::new("NRG003", "Lucky Pendant", Category::Necklace, "Rose Gold", 7850.00, "Necklace/NRG003.png", r#"18""#),
    SeedProduct::new("EG001", "Château Lumière", Category::Earring, "Gold", 6800.00, "Earring/EG001.png", "Standard"),
    SeedProduct::new("EG002", "Champagne Halo", Category::Earring, "Gold", 6900.00, "Earring/EG002.png", "Standard"),
    SeedProduct::new("EG003", "Chrysalis Monarch", Category::Earring, "Gold", 7000.00, "Earring/EG003.png", "Standard"),
    SeedProduct::new("ERG001", "Solstice Lustre", Category::Earring, "Rose Gold", 6750.00, "Earring/ERG001.png", "Standard"),
    SeedProduct::new("ERG002", "Ambroise Clair", Category::Earring, "Rose Gold", 6800.00, "Earring/ERG002.png", "Standard"),
    SeedProduct::new("ERG003", "Luxeria Dawn", Category::Earring, "Rose Gold", 6900.00, "Earring/ERG003.png", "Standard"),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_codes_and_names_unique() {
        let codes: HashSet<_> = SEED_PRODUCTS.iter().map(|p| p.code).collect();
        let names: HashSet<_> = SEED_PRODUCTS.iter().map(|p| p.name).collect();

        assert_eq!(codes.len(), SEED_PRODUCTS.len());
        assert_eq!(names.len(), SEED_PRODUCTS.len());
    }

    #[test]
    fn test_six_per_category() {
        for category in Category::ALL {
            let count = SEED_PRODUCTS
                .iter()
                .filter(|p| p.category == category)
                .count();
            assert_eq!(count, 6, "{category}");
        }
    }

    #[test]
    fn test_image_under_category_folder() {
        for product in SEED_PRODUCTS {
            assert!(product.image.starts_with(product.category.as_str()));
            assert!(product.image.ends_with(&format!("{}.png", product.code)));
        }
    }
}
