//! The documented bots, expressed as configuration records over the shared
//! pipeline. Field mappings, filters and menu routes mirror the reports as
//! the ERP lays them out; template assets and directories come from the
//! caller-supplied [`BotEnv`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;

use crate::ingest::{ColumnMap, IncludeFilter, IngestRules};
use crate::locator::ElementSpec;
use crate::runner::BotSpec;
use crate::screen::{Key, ScreenPoint};
use crate::sequencer::{FilterAction, ReportMacro, SaveDialog};
use crate::sync::{SyncPolicy, TableSchema};

/// Externally supplied environment for building a bot: application shortcut,
/// template assets and working directories. The library never reads
/// configuration files; the binary assembles this from flags/env.
#[derive(Debug, Clone)]
pub struct BotEnv {
    pub uniplus_shortcut: PathBuf,
    pub assets_dir: PathBuf,
    pub input_dir: PathBuf,
    pub archive_dir: PathBuf,
    /// Last-resort fixed coordinates per menu item, when configured.
    pub menu_fallbacks: HashMap<String, ScreenPoint>,
}

impl BotEnv {
    fn menu_spec(&self, item: &str) -> ElementSpec {
        let mut spec = ElementSpec::named(item)
            .with_template(self.assets_dir.join(format!("{item}_1.png")))
            .with_secondary_template(self.assets_dir.join(format!("{item}_2.png")));
        if let Some(point) = self.menu_fallbacks.get(item) {
            spec = spec.with_fixed(*point);
        }
        spec
    }
}

pub const BOT_NAMES: &[&str] = &["vendas-pdv", "precos"];

pub fn by_name(name: &str, env: &BotEnv) -> Option<BotSpec> {
    match name {
        "vendas-pdv" | "vendas_pdv" => Some(vendas_pdv(env)),
        "precos" => Some(precos(env)),
        _ => None,
    }
}

/// Daily point-of-sale sales report. Incremental, append-only sync keyed on
/// the issue-date/time/document triple.
pub fn vendas_pdv(env: &BotEnv) -> BotSpec {
    let today = Local::now().format("%d%m%Y").to_string();
    let pause = Duration::from_secs(1);

    let extract = ReportMacro {
        name: "vendas_pdv".into(),
        launch: Some(env.uniplus_shortcut.clone()),
        popup_clears: 9,
        menu: vec![
            env.menu_spec("vendas"),
            env.menu_spec("relatorios"),
            env.menu_spec("vendas_por_pdv"),
        ],
        filter: Vec::new(),
        export_open: Vec::new(),
        // The report grid takes a while to render; the long lookup timeout
        // doubles as the load wait.
        export: ElementSpec::named("excel_button")
            .with_template(env.assets_dir.join("excel_button_1.png"))
            .with_secondary_template(env.assets_dir.join("excel_button_2.png"))
            .with_text("Exportar para Excel")
            .with_timeout(Duration::from_secs(30)),
        export_params: vec![
            FilterAction::Press(Key::Tab),
            FilterAction::Press(Key::Tab),
            FilterAction::Press(Key::Tab),
            FilterAction::Pause(pause),
            FilterAction::Type(today.clone()),
            FilterAction::Pause(pause),
            FilterAction::Type(today.clone()),
        ],
        confirm: Some(Key::F10),
        save: SaveDialog {
            filename: format!("vendas_pdv_{today}.csv"),
            folder: env.input_dir.display().to_string(),
        },
        settle: Duration::from_secs(2),
    };

    let columns = [
        ("PDV", "pdv"),
        ("Filial", "filial"),
        ("Usuário", "usuario"),
        ("Vendedor", "vendedor"),
        ("Emissão", "emissao"),
        ("Hora", "hora"),
        ("Documento", "documento"),
        ("CCF", "ccf"),
        ("V.bruto", "v_bruto"),
        ("Desconto", "desconto"),
        ("Acréscimo", "acrescimo"),
        ("V.venda", "v_venda"),
        ("Devolução/Troca", "devolucao_troca"),
        ("V.líquido", "v_liquido"),
        ("Canc.", "canc"),
        ("Cliente", "cliente"),
        ("Cnpj/Cpf", "cnpj_cpf"),
        ("Finalizador", "finalizador"),
        ("Valor finalizador", "valor_finalizador"),
    ];

    BotSpec {
        name: "vendas-pdv".into(),
        extract,
        rules: IngestRules {
            header_marker: "PDV".into(),
            trailing_rows: 0,
            columns: columns
                .iter()
                .map(|(source, canonical)| ColumnMap::new(*source, *canonical))
                .collect(),
            include: Some(IncludeFilter {
                column: "pdv".into(),
                allowed: ["1", "2", "3"].into_iter().map(String::from).collect(),
            }),
            required: Some("documento".into()),
            natural_key: vec!["emissao".into(), "hora".into(), "documento".into()],
        },
        schema: TableSchema {
            table: "uniplus_vendas_pdv".into(),
            columns: columns.iter().map(|(_, c)| c.to_string()).collect(),
            key: vec!["emissao".into(), "hora".into(), "documento".into()],
        },
        policy: SyncPolicy::Incremental,
        input_dir: env.input_dir.clone(),
        archive_dir: env.archive_dir.clone(),
    }
}

/// Server price list. This bot deliberately replaces the whole table on
/// every run (downstream consumers want a snapshot, not a ledger), so it is
/// the one full-refresh bot.
pub fn precos(env: &BotEnv) -> BotSpec {
    let today = Local::now().format("%d_%m_%Y").to_string();
    let pause = Duration::from_secs(1);
    let grid_load = Duration::from_secs(15);

    let extract = ReportMacro {
        name: "precos".into(),
        launch: Some(env.uniplus_shortcut.clone()),
        popup_clears: 9,
        menu: vec![env
            .menu_spec("produtos")
            .with_text("Produtos")
            .with_confidence(0.97)],
        filter: vec![
            FilterAction::Press(Key::Tab),
            FilterAction::Pause(pause),
            FilterAction::Type("report_precos".into()),
            FilterAction::Pause(pause),
            FilterAction::Press(Key::Enter),
            FilterAction::Pause(pause),
            FilterAction::Click(
                ElementSpec::named("carregar_visao").with_fixed(ScreenPoint::new(456, 141)),
            ),
            FilterAction::Pause(grid_load),
            FilterAction::Press(Key::Tab),
            FilterAction::Press(Key::Tab),
            FilterAction::Press(Key::Tab),
            FilterAction::Pause(pause),
            FilterAction::Press(Key::Enter),
            FilterAction::Pause(pause),
            FilterAction::Click(
                ElementSpec::named("carregar_grade").with_fixed(ScreenPoint::new(1901, 134)),
            ),
            FilterAction::Pause(grid_load),
        ],
        export_open: vec![
            FilterAction::Chord(vec![Key::Control, Key::Char('p')]),
            FilterAction::Pause(pause),
        ],
        export: ElementSpec::named("exportar_excel")
            .with_template(env.assets_dir.join("exportar_excel_1.png"))
            .with_secondary_template(env.assets_dir.join("exportar_excel_2.png"))
            .with_text("Excel")
            .with_confidence(0.97),
        export_params: Vec::new(),
        confirm: Some(Key::F10),
        save: SaveDialog {
            filename: format!("precos_{today}.csv"),
            folder: env.input_dir.display().to_string(),
        },
        settle: Duration::from_secs(2),
    };

    let columns = [
        ("Código", "sku"),
        ("Código de barras", "ean"),
        ("Preço unit.", "preco_venda"),
        ("Valor do preço na última compra", "preco_ultima_compra"),
    ];

    BotSpec {
        name: "precos".into(),
        extract,
        rules: IngestRules {
            header_marker: "Código".into(),
            trailing_rows: 2,
            columns: columns
                .iter()
                .map(|(source, canonical)| ColumnMap::new(*source, *canonical))
                .collect(),
            include: None,
            required: None,
            natural_key: vec!["sku".into()],
        },
        schema: TableSchema {
            table: "precos_api".into(),
            columns: columns.iter().map(|(_, c)| c.to_string()).collect(),
            key: vec!["sku".into()],
        },
        policy: SyncPolicy::FullRefresh,
        input_dir: env.input_dir.clone(),
        archive_dir: env.archive_dir.clone(),
    }
}
