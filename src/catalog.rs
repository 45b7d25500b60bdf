use serde::Serialize;
use std::{collections::HashMap, fmt};
use thiserror::Error;

/// Resin codes the classifier was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResinLabel {
    #[serde(rename = "HDPE")]
    Hdpe,
    #[serde(rename = "LDPE")]
    Ldpe,
    #[serde(rename = "PET")]
    Pet,
    #[serde(rename = "PP")]
    Pp,
    #[serde(rename = "PS")]
    Ps,
    #[serde(rename = "PVC")]
    Pvc,
}

impl ResinLabel {
    /// Position `i` is the label of output `i` of the model.
    pub const ALL: [ResinLabel; 6] = [
        ResinLabel::Hdpe,
        ResinLabel::Ldpe,
        ResinLabel::Pet,
        ResinLabel::Pp,
        ResinLabel::Ps,
        ResinLabel::Pvc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResinLabel::Hdpe => "HDPE",
            ResinLabel::Ldpe => "LDPE",
            ResinLabel::Pet => "PET",
            ResinLabel::Pp => "PP",
            ResinLabel::Ps => "PS",
            ResinLabel::Pvc => "PVC",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for ResinLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResinRecord {
    #[serde(skip)]
    pub label: ResinLabel,
    pub name: &'static str,
    pub description: &'static str,
    pub recycling_time: &'static str,
    pub uses: &'static [&'static str],
    pub recycling_symbol: &'static str,
    pub environmental_impact: &'static str,
    pub recycling_tips: &'static [&'static str],
}

#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("No catalog entry for resin label {0}")]
    MissingEntry(ResinLabel),
}

const RECORDS: [ResinRecord; 6] = [
    ResinRecord {
        label: ResinLabel::Pet,
        name: "Polyethylene Terephthalate (PET)",
        description: "PET adalah plastik yang sering digunakan untuk botol minuman dan wadah makanan karena sifatnya yang kuat dan ringan.",
        recycling_time: "20-500 tahun",
        uses: &[
            "Botol minuman",
            "Wadah makanan",
            "Serat tekstil",
            "Kemasan makanan",
        ],
        recycling_symbol: "1",
        environmental_impact: "PET dapat mencemari lingkungan jika tidak didaur ulang dengan benar, namun merupakan salah satu jenis plastik yang paling mudah didaur ulang.",
        recycling_tips: &[
            "Bilas botol sebelum didaur ulang",
            "Lepaskan tutup botol",
            "Tekan botol untuk menghemat ruang",
        ],
    },
    ResinRecord {
        label: ResinLabel::Hdpe,
        name: "High-Density Polyethylene (HDPE)",
        description: "HDPE adalah plastik yang keras dan tahan terhadap berbagai zat kimia, sering digunakan untuk botol susu dan wadah produk pembersih.",
        recycling_time: "30-500 tahun",
        uses: &[
            "Botol susu",
            "Wadah produk pembersih",
            "Kantong belanja",
            "Pipa",
        ],
        recycling_symbol: "2",
        environmental_impact: "HDPE lebih tahan lama di lingkungan dibanding PET, namun juga dapat didaur ulang dengan mudah.",
        recycling_tips: &[
            "Kosongkan dan bersihkan wadah",
            "Lepaskan label jika memungkinkan",
            "Pisahkan tutup jika berbeda jenis plastik",
        ],
    },
    ResinRecord {
        label: ResinLabel::Pvc,
        name: "Polyvinyl Chloride (PVC)",
        description: "PVC memiliki ketahanan tinggi terhadap kelembaban dan bahan kimia, sering digunakan dalam pipa dan kemasan medis.",
        recycling_time: "50-500 tahun",
        uses: &["Pipa air", "Kemasan medis", "Vinil lantai", "Frame jendela"],
        recycling_symbol: "3",
        environmental_impact: "PVC dapat melepaskan zat berbahaya saat dibakar dan sulit didaur ulang, membutuhkan penanganan khusus.",
        recycling_tips: &[
            "Cari fasilitas daur ulang khusus",
            "Jangan dibakar",
            "Pisahkan dari plastik lain",
        ],
    },
    ResinRecord {
        label: ResinLabel::Ldpe,
        name: "Low-Density Polyethylene (LDPE)",
        description: "LDPE adalah plastik fleksibel yang sering digunakan untuk kantong plastik dan film pembungkus.",
        recycling_time: "10-100 tahun",
        uses: &[
            "Kantong plastik",
            "Film pembungkus",
            "Lapisan karton minuman",
            "Botol yang bisa diremas",
        ],
        recycling_symbol: "4",
        environmental_impact: "LDPE dapat mencemari laut dan tanah, namun memiliki masa degradasi yang lebih singkat dibanding plastik lain.",
        recycling_tips: &[
            "Bersihkan dari kontaminan",
            "Kumpulkan dalam jumlah besar",
            "Pastikan dalam kondisi kering",
        ],
    },
    ResinRecord {
        label: ResinLabel::Pp,
        name: "Polypropylene (PP)",
        description: "PP adalah plastik yang tahan panas dan banyak digunakan dalam wadah makanan, sedotan, dan produk medis.",
        recycling_time: "20-30 tahun",
        uses: &[
            "Wadah makanan",
            "Sedotan",
            "Alat medis",
            "Komponen otomotif",
        ],
        recycling_symbol: "5",
        environmental_impact: "PP relatif aman untuk makanan dan minuman panas, namun tetap berkontribusi pada pencemaran lingkungan jika tidak didaur ulang.",
        recycling_tips: &[
            "Bersihkan sisa makanan",
            "Pastikan kering sebelum didaur ulang",
            "Pisahkan tutup jika berbeda jenis",
        ],
    },
    ResinRecord {
        label: ResinLabel::Ps,
        name: "Polystyrene (PS)",
        description: "PS adalah plastik yang umum ditemukan dalam bentuk styrofoam dan digunakan untuk kemasan sekali pakai serta isolasi.",
        recycling_time: "50-500 tahun",
        uses: &[
            "Kemasan styrofoam",
            "Cangkir sekali pakai",
            "Isolasi",
            "Peralatan makan sekali pakai",
        ],
        recycling_symbol: "6",
        environmental_impact: "PS sangat sulit terurai dan dapat mencemari lingkungan dalam waktu sangat lama, terutama di lautan.",
        recycling_tips: &[
            "Hindari penggunaan jika memungkinkan",
            "Gunakan alternatif ramah lingkungan",
            "Bersihkan sebelum didaur ulang",
        ],
    },
];

/// Read-only lookup from resin label to its descriptive record.
#[derive(Debug, Clone)]
pub struct ResinCatalog {
    records: HashMap<ResinLabel, ResinRecord>,
}

impl ResinCatalog {
    pub fn new() -> Self {
        Self::from_records(RECORDS)
    }

    pub fn from_records(records: impl IntoIterator<Item = ResinRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.label, record))
            .collect();
        Self { records }
    }

    pub fn lookup(&self, label: ResinLabel) -> Result<&ResinRecord, CatalogError> {
        self.records
            .get(&label)
            .ok_or(CatalogError::MissingEntry(label))
    }

    /// Fails on the first label without an entry.
    pub fn validate(&self, labels: &[ResinLabel]) -> Result<(), CatalogError> {
        for label in labels {
            self.lookup(*label)?;
        }
        Ok(())
    }
}

impl Default for ResinCatalog {
    fn default() -> Self {
        Self::new()
    }
}
