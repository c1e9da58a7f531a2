//! Dimension catalog
//!
//! `customEvent:*` entries are parameters this deployment is known to
//! collect; anything else the live property exposes is resolved at execution
//! time through the metadata prefixes.

use super::{field, FieldCategory as C, FieldDef, FieldScope as S};

pub static DIMENSIONS: &[FieldDef] = &[
    // ------------------ Time ------------------
    field("date", "날짜", &["날짜", "일자"], &["언제", "기간", "일별"], C::Time, None, 5),
    field("dateHour", "날짜 + 시간", &["날짜시간"], &["시간별"], C::Time, None, 4),
    field("dayOfWeekName", "요일 이름", &["요일"], &["월요일", "주말"], C::Time, None, 4),
    field("week", "주", &["주간", "주차"], &["주별"], C::Time, None, 4),
    field("month", "월", &["월간"], &["월별"], C::Time, None, 4),
    field("year", "연도", &["년도"], &[], C::Time, None, 4),
    field("yearMonth", "연도 월", &["연월"], &[], C::Time, None, 3),
    // ------------------ Event ------------------
    field(
        "eventName",
        "이벤트 이름",
        &["이벤트"],
        &["가입", "구매", "클릭", "전환"],
        C::Event,
        None,
        5,
    ),
    // ------------------ Page ------------------
    field("pagePath", "페이지 경로", &["경로", "페이지주소"], &["페이지별"], C::Page, None, 4),
    field("pageTitle", "페이지 제목", &["페이지제목", "제목"], &["페이지 이름"], C::Page, None, 4),
    field(
        "landingPage",
        "방문 페이지",
        &["랜딩페이지", "랜딩"],
        &["처음 도착한 페이지"],
        C::Page,
        None,
        4,
    ),
    // ------------------ Device ------------------
    field(
        "deviceCategory",
        "기기 카테고리",
        &["디바이스", "기기"],
        &["모바일", "데스크톱", "태블릿", "기기별"],
        C::Device,
        None,
        5,
    ),
    field("browser", "브라우저", &["브라우저"], &["크롬", "사파리"], C::Device, None, 3),
    field(
        "operatingSystem",
        "운영체제",
        &["os", "운영체제"],
        &["안드로이드", "ios"],
        C::Device,
        None,
        3,
    ),
    // ------------------ Geo ------------------
    field("country", "국가", &["나라"], &["국가별"], C::Geo, None, 4),
    field("city", "도시", &[], &["도시별"], C::Geo, None, 3),
    field("region", "지역", &[], &[], C::Geo, None, 3),
    field("continent", "대륙", &[], &[], C::Geo, None, 2),
    // ------------------ Traffic ------------------
    field("source", "소스", &["유입"], &[], C::Traffic, None, 4),
    field("medium", "매체", &[], &[], C::Traffic, None, 4),
    field("sourceMedium", "소스/매체", &["소스매체"], &[], C::Traffic, None, 4),
    field(
        "defaultChannelGroup",
        "기본 채널 그룹",
        &["채널"],
        &["채널별"],
        C::Traffic,
        None,
        5,
    ),
    // ------------------ User ------------------
    field(
        "newVsReturning",
        "신규/재방문",
        &["신규재방문"],
        &["재방문", "처음 방문"],
        C::User,
        None,
        3,
    ),
    field("userAgeBracket", "연령대", &["연령", "나이"], &["연령별"], C::User, None, 3),
    field("userGender", "성별", &["성별"], &["남성", "여성"], C::User, None, 3),
    // ------------------ Item (ecommerce scope) ------------------
    field(
        "itemName",
        "항목 이름",
        &["상품명", "제품명"],
        &["아이템이름"],
        C::Ecommerce,
        Some(S::Item),
        5,
    ),
    field("itemId", "상품 ID", &["상품아이디"], &["제품id"], C::Ecommerce, Some(S::Item), 4),
    field("itemBrand", "상품 브랜드", &["브랜드"], &["브랜드명"], C::Ecommerce, Some(S::Item), 3),
    field(
        "itemCategory",
        "상품 카테고리",
        &["카테고리1", "대분류"],
        &["상품분류"],
        C::Ecommerce,
        Some(S::Item),
        3,
    ),
    field(
        "itemVariant",
        "상품 옵션",
        &["옵션", "색상", "사이즈"],
        &["상품변형"],
        C::Ecommerce,
        Some(S::Item),
        2,
    ),
    // ------------------ Custom event parameters ------------------
    field(
        "customEvent:is_regular_donation",
        "정기후원 여부",
        &["is_regular_donation", "정기후원여부", "정기후원", "정기/일시"],
        &["정기후원", "일시후원"],
        C::Event,
        Some(S::Event),
        5,
    ),
    field(
        "customEvent:donation_name",
        "후원명",
        &["donation_name", "후원명", "후원이름"],
        &["후원명"],
        C::Event,
        Some(S::Event),
        5,
    ),
    field(
        "customEvent:country_name",
        "국가명(커스텀)",
        &["country_name", "국가명"],
        &["국가별"],
        C::Event,
        Some(S::Event),
        4,
    ),
    field(
        "customEvent:menu_name",
        "메뉴명",
        &["menu_name", "메뉴명", "메뉴 네임", "메뉴이름"],
        &["메뉴", "네비", "gnb"],
        C::Event,
        Some(S::Event),
        5,
    ),
    field(
        "customEvent:banner_name",
        "배너명",
        &["banner_name", "배너명", "배너 이름"],
        &["배너"],
        C::Event,
        Some(S::Event),
        4,
    ),
    field(
        "customEvent:button_name",
        "버튼명",
        &["button_name", "버튼명", "버튼 이름"],
        &["버튼"],
        C::Event,
        Some(S::Event),
        4,
    ),
    field(
        "customEvent:click_text",
        "클릭 텍스트",
        &["click_text", "클릭텍스트", "클릭 문자열"],
        &["클릭 문구", "버튼 문구"],
        C::Event,
        Some(S::Event),
        4,
    ),
    field(
        "customEvent:percent_scrolled",
        "스크롤 비율",
        &["percent_scrolled", "스크롤비율", "스크롤"],
        &["스크롤 깊이"],
        C::Event,
        Some(S::Event),
        4,
    ),
    field(
        "customEvent:content_type",
        "콘텐츠 유형",
        &["content_type", "콘텐츠유형", "콘텐츠 타입"],
        &["콘텐츠 유형"],
        C::Event,
        Some(S::Event),
        4,
    ),
    field(
        "customEvent:payment_type",
        "결제 수단",
        &["payment_type", "결제수단", "결제 방법"],
        &["카드", "계좌이체"],
        C::Event,
        Some(S::Event),
        4,
    ),
];
