//! The seven built-in specialists.

use std::sync::Arc;

use tracing::info;

use super::{Facet, PromptSpecialist, RegistrationError, Specialist, SpecialistRegistry};

fn generalist() -> Result<PromptSpecialist, RegistrationError> {
    Ok(PromptSpecialist::new(
        "generalist",
        "General assistant",
        "Answers questions and handles requests no specialist claims",
    )?
    .capabilities(&["question answering", "general writing", "explanations"])
    .system_prompt(
        "You are a helpful, accurate assistant. Answer directly, structure longer \
         answers with Markdown headings and lists, and say so when you are unsure.",
    ))
}

fn speech_writer() -> Result<PromptSpecialist, RegistrationError> {
    Ok(PromptSpecialist::new(
        "speech_writer",
        "Speech writer",
        "Drafts speeches and addresses for formal and informal occasions",
    )?
    .capabilities(&["keynote speeches", "annual meeting addresses", "toasts", "mobilisation speeches"])
    .system_prompt(
        "You are an experienced speech writer. Produce a complete speech in Markdown with \
         a title, an engaging opening, a clearly structured body and a memorable close. \
         Match the tone to the occasion and the audience.",
    )
    .facet(
        Facet::new("occasion", "general")
            .option("annual meeting", &["年会", "年终", "annual meeting", "year-end"])
            .option("mobilization", &["动员", "誓师", "mobilization", "mobilisation", "kick-off"])
            .option("party meeting", &["党会", "党员大会", "支部会", "party meeting"])
            .option("new year", &["新年", "元旦", "春节", "new year"])
            .option("opening ceremony", &["开业", "开幕", "揭牌", "grand opening"])
            .option("celebration", &["庆典", "周年", "anniversary", "celebration"])
            .option("graduation", &["毕业", "graduation", "commencement"])
            .option("training", &["培训", "讲座", "training", "workshop"])
            .option("award ceremony", &["表彰", "颁奖", "award"])
            .option("farewell", &["追悼", "悼念", "告别", "eulogy", "farewell"])
            .option("welcome", &["欢迎", "welcome"])
            .option("product launch", &["产品发布", "新品发布", "product launch"]),
    )
    .facet(
        Facet::new("audience", "general")
            .option("employees", &["员工", "同事", "employees", "staff", "team"])
            .option("leadership", &["领导", "leadership", "executives"])
            .option("customers", &["客户", "合作伙伴", "customers", "partners"])
            .option("students", &["学生", "同学", "students"])
            .option("guests", &["嘉宾", "来宾", "guests"]),
    ))
}

fn news_writer() -> Result<PromptSpecialist, RegistrationError> {
    Ok(PromptSpecialist::new(
        "news_writer",
        "News writer",
        "Writes press releases and news articles in inverted-pyramid style",
    )?
    .capabilities(&["press releases", "product announcements", "corporate news"])
    .system_prompt(
        "You are a corporate communications writer. Write a press release in Markdown: \
         headline, dateline and lead paragraph answering who, what, when and where, \
         supporting paragraphs in decreasing importance, a quote, and a boilerplate section.",
    )
    .facet(
        Facet::new("newsType", "corporate news")
            .option("product launch", &["发布", "新品", "launch", "unveil"])
            .option("personnel", &["任命", "人事", "appoint", "hires", "joins as"])
            .option("partnership", &["合作", "签约", "partnership", "partner with"])
            .option("event", &["活动", "event", "conference"])
            .option("earnings", &["业绩", "财报", "earnings", "revenue", "quarterly results"]),
    ))
}

fn official_document() -> Result<PromptSpecialist, RegistrationError> {
    Ok(PromptSpecialist::new(
        "official_document",
        "Official document writer",
        "Drafts notices, requests, reports and other formal documents",
    )?
    .capabilities(&["notices", "requests for instructions", "work reports", "meeting minutes", "memos"])
    .system_prompt(
        "You draft formal administrative documents. Use the conventional structure for the \
         document kind: title, addressee, body, closing and issuing party with date. Keep \
         the language precise, neutral and concise.",
    )
    .facet(
        Facet::new("officialType", "notice")
            .option("request for instructions", &["请示", "request for instructions", "approval request"])
            .option("report", &["报告", "report"])
            .option("reply", &["批复", "reply"])
            .option("letter", &["函", "letter"])
            .option("minutes", &["纪要", "minutes"])
            .option("plan", &["方案", "plan"])
            .option("regulation", &["制度", "规定", "regulation", "policy"])
            .option("notice", &["通知", "notice", "announcement"]),
    )
    .facet(
        Facet::new("urgency", "routine")
            .option("urgent", &["特急", "紧急", "urgent", "immediately"])
            .option("expedited", &["急件", "尽快", "加急", "asap", "expedite"]),
    ))
}

fn research_report() -> Result<PromptSpecialist, RegistrationError> {
    Ok(PromptSpecialist::new(
        "research_report",
        "Research analyst",
        "Produces market, industry and investment research reports",
    )?
    .capabilities(&["market research", "industry analysis", "feasibility studies", "investment research"])
    .system_prompt(
        "You are a senior research analyst. Write a research report in Markdown with an \
         executive summary, numbered sections, explicit assumptions, risks and a conclusion \
         with recommendations. Mark any figures you estimate.",
    )
    .facet(
        Facet::new("reportType", "industry analysis")
            .option("market research", &["市场", "market"])
            .option("feasibility study", &["可行性", "feasibility"])
            .option("competitive analysis", &["竞争", "competit"])
            .option("technology assessment", &["技术", "technolog"])
            .option("investment research", &["投资", "investment", "valuation"])
            .option("industry analysis", &["行业", "industry"]),
    )
    .facet(
        Facet::new("depth", "standard")
            .option("overview", &["概览", "简要", "overview", "brief"])
            .option("in-depth", &["深度", "详细", "深入", "in-depth", "detailed", "comprehensive"]),
    )
    .facet(
        Facet::new("industry", "general")
            .option("internet", &["互联网", "电商", "internet", "e-commerce"])
            .option("finance", &["金融", "银行", "证券", "finance", "banking"])
            .option("manufacturing", &["制造", "工业", "manufacturing"])
            .option("real estate", &["房地产", "地产", "real estate"])
            .option("healthcare", &["医疗", "医药", "healthcare", "pharma"])
            .option("education", &["教育", "education"])
            .option("retail", &["零售", "retail"])
            .option("automotive", &["汽车", "automotive", "vehicle"]),
    ))
}

fn code_assistant() -> Result<PromptSpecialist, RegistrationError> {
    Ok(PromptSpecialist::new(
        "code_assistant",
        "Code assistant",
        "Writes, reviews, explains and debugs source code",
    )?
    .capabilities(&["code generation", "code review", "debugging", "refactoring", "explanations"])
    .system_prompt(
        "You are a senior software engineer. Return working, idiomatic code in fenced code \
         blocks, followed by a short explanation of the approach and any trade-offs. Point \
         out bugs and edge cases you notice.",
    )
    .facet(
        Facet::new("language", "unspecified")
            .option("python", &["python", "django", "flask", "pandas", "numpy"])
            .option("typescript", &["typescript"])
            .option("javascript", &["javascript", "node.js", "react", "vue"])
            .option("java", &["java", "spring"])
            .option("go", &["golang"])
            .option("rust", &["rust", "cargo", "tokio"])
            .option("cpp", &["c++", "cpp"]),
    )
    .facet(
        Facet::new("taskType", "generation")
            .option("debugging", &["调试", "修复", "bug", "debug", "fix"])
            .option("review", &["审查", "review"])
            .option("explanation", &["解释", "explain"])
            .option("refactoring", &["重构", "refactor"])
            .option("consulting", &["最佳实践", "架构", "best practice", "architecture"])
            .option("generation", &["生成", "实现", "write", "create", "implement"]),
    )
    .tag_code_fences_with("language"))
}

fn data_analysis() -> Result<PromptSpecialist, RegistrationError> {
    Ok(PromptSpecialist::new(
        "data_analysis",
        "Data analyst",
        "Interprets data and produces analysis reports with recommendations",
    )?
    .capabilities(&["descriptive statistics", "forecasting", "root-cause analysis", "recommendations"])
    .system_prompt(
        "You are a data analyst. Structure the analysis as: question, data overview, method, \
         findings with tables where helpful, and actionable recommendations. State the \
         limitations of the data explicitly.",
    )
    .facet(
        Facet::new("analysisType", "descriptive")
            .option("predictive", &["预测", "趋势", "predict", "forecast", "trend"])
            .option("diagnostic", &["原因", "为什么", "相关性", "why", "cause", "correlat"])
            .option("prescriptive", &["建议", "优化", "recommend", "optimi", "strategy"])
            .option("descriptive", &["描述", "统计", "汇总", "describe", "summar", "statistic"]),
    )
    .facet(
        Facet::new("dataType", "general")
            .option("sales", &["销售", "营收", "sales", "revenue"])
            .option("user", &["用户", "客户", "user", "customer"])
            .option("financial", &["财务", "成本", "利润", "financial", "cost", "profit"])
            .option("operations", &["运营", "效率", "operations", "kpi"])
            .option("market", &["市场", "份额", "market"]),
    ))
}

/// Builds every built-in specialist, generalist first.
///
/// # Errors
///
/// [`RegistrationError::BlankLabel`] if a built-in label is blank.
pub fn builtin_specialists() -> Result<Vec<PromptSpecialist>, RegistrationError> {
    Ok(vec![
        generalist()?,
        speech_writer()?,
        news_writer()?,
        official_document()?,
        research_report()?,
        code_assistant()?,
        data_analysis()?,
    ])
}

/// Registers every built-in specialist into `registry`.
///
/// # Errors
///
/// The first [`RegistrationError`], e.g. a label already taken by a custom
/// specialist registered earlier.
pub fn register_builtin_specialists(
    registry: &mut SpecialistRegistry,
) -> Result<(), RegistrationError> {
    for specialist in builtin_specialists()? {
        let label = specialist.label().clone();
        registry.register(label.clone(), Arc::new(specialist))?;
        info!(handler = %label, "specialist registered");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use domain::{HandlerLabel, RuleTable};

    use super::*;

    #[test]
    fn test_every_default_rule_label_has_a_specialist() {
        let mut registry = SpecialistRegistry::new();
        register_builtin_specialists(&mut registry).unwrap();
        assert_eq!(registry.len(), 7);
        assert!(registry.contains(&HandlerLabel::generalist()));
        for rule in RuleTable::default_rules().rules() {
            assert!(registry.contains(rule.label()), "missing {}", rule.label());
        }
    }

    #[test]
    fn test_registering_twice_fails_with_duplicate() {
        let mut registry = SpecialistRegistry::new();
        register_builtin_specialists(&mut registry).unwrap();
        let err = register_builtin_specialists(&mut registry).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateLabel { .. }));
    }

    #[test]
    fn test_code_assistant_facets() {
        let specialist = code_assistant().unwrap();
        assert_eq!(
            specialist.analyse("Please fix this TypeScript bug"),
            vec![("language", "typescript"), ("taskType", "debugging")]
        );
    }

    #[test]
    fn test_data_analysis_facets() {
        let specialist = data_analysis().unwrap();
        assert_eq!(
            specialist.analyse("请预测下季度的销售数据"),
            vec![("analysisType", "predictive"), ("dataType", "sales")]
        );
    }

    #[test]
    fn test_speech_facets_fall_back_to_general() {
        let specialist = speech_writer().unwrap();
        assert_eq!(
            specialist.analyse("a short speech"),
            vec![("occasion", "general"), ("audience", "general")]
        );
    }
}
